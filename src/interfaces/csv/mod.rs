pub mod cart_reader;
pub mod listing_reader;
pub mod report_writer;
