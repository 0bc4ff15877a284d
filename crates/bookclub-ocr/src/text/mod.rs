pub mod cleanup;
pub mod fields;
pub mod noise;

pub use cleanup::{clean_str, clean_text};
pub use fields::{
    ExtractedFields, extract_author, extract_fields, extract_publisher, extract_title,
    extract_year,
};
pub use noise::fix_ocr_confusions;
