mod calibration;
mod choke_point;
mod common;
mod engagement;
mod motion;
mod safe_mode;
mod selection;
mod servo_failure;
