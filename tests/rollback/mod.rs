mod host_root;
mod restores_prior_state;
mod rollback_of_crash;
