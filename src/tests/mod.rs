//! End-to-end scenarios on the simulated rig.

mod scenario_tests;
