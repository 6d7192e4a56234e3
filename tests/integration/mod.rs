//! Integration tests for the thinkblocks lesson planner

mod config_loading;
mod lesson_pipeline;
mod lesson_store;
mod planner_api;
mod test_utils;
