mod backend_timeout;
mod idempotence;
mod nothing_observable;
mod packages_and_alerts;
