pub mod bmes;
pub mod tags;

pub use bmes::{boundary_indices, decode, decode_str, encode, encode_tags, sentinel_wrap};
pub use tags::{tags_to_string, BoundaryTag, WORD_END, WORD_START};
