mod common;
mod dispatch_tests;
mod memo_tests;
mod rebuild_tests;
