mod confirm_gate;
mod dependency_skips;
mod happy_path;
