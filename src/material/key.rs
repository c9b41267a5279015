//! Pipeline variant identity

use crate::backend::RenderTargetHandle;

/// Identifies exactly one compiled pipeline variant.
///
/// Two keys with equal fields are interchangeable; equality and hash cover
/// all three fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub render_target: RenderTargetHandle,
    pub subpass: u32,
    pub variant: u32,
}

impl PipelineKey {
    pub fn new(render_target: RenderTargetHandle, subpass: u32, variant: u32) -> Self {
        Self {
            render_target,
            subpass,
            variant,
        }
    }

    /// True when this key renders into the given target and subpass
    pub fn matches(&self, render_target: RenderTargetHandle, subpass: u32) -> bool {
        self.render_target == render_target && self.subpass == subpass
    }
}
