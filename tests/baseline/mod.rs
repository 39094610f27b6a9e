mod target_kinds;
