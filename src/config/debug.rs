//! Debugging feature flags.
//!
//! Toggle individual diagnostics here; keep them `false` by default so release
//! builds remain quiet. All flags are further gated by `cfg(debug_assertions)`.

pub struct DebugFlags {
    /// Emit cache hit/miss diagnostics (keys, timings, eviction counts).
    pub print_cache_events: bool,
    /// Emit per-level touch/reaction details during validation.
    pub print_validation_details: bool,
    /// Emit every predicted level with its rule/model/hybrid confidences.
    pub print_projection_details: bool,
    /// Emit progress as per-symbol batch runs start and finish.
    pub print_batch_progress: bool,
}

pub const DEBUG_FLAGS: DebugFlags = DebugFlags {
    print_cache_events: false,
    print_validation_details: false,
    print_projection_details: false,
    print_batch_progress: true,
};
