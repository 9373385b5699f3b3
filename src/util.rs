pub mod year_ext;
