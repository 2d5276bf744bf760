// Shared fakes and cross-module scenario tests

pub mod fakes;

mod coordinator_tests;
