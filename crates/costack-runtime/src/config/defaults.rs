//! Compile-time defaults, merged by build.rs from library values and an
//! optional `COSTACK_CONFIG_RS` user file.

include!(concat!(env!("OUT_DIR"), "/costack_defaults.rs"));
