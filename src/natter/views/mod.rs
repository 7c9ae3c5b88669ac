pub mod transcript_view;

pub use transcript_view::{
    format_file_size, is_image_reply, is_image_url, render_message, render_transcript,
};
