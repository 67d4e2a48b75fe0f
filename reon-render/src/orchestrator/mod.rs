pub mod draw_buckets;
pub mod frame_context;
pub mod frame_orchestrator;
pub mod frame_targets;
pub mod pipeline_cache;
