// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export the helpers the handlers are built from
pub use handlers::{
    StagedComment, build_staged_records, describe_outcome, load_page_from_file,
    parse_comment_arg, parse_host_arg, resolve_config,
};
