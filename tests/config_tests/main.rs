//! Configuration test suite

mod tuning_tests;
