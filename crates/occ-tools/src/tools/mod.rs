pub mod patch_file;
pub mod read_many_files;
pub mod web_fetch;
pub mod web_search;
