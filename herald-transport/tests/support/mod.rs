#![allow(dead_code)]

pub mod mock_http;
pub mod mock_smtp;
