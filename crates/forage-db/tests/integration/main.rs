mod common;
mod content_store_tests;
mod status_store_tests;
