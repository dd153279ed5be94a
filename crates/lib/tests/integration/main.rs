mod common;

mod build_tests;
mod configuration_tests;
mod item_tests;
