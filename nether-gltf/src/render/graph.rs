//! Frame render graph
//!
//! A frame is an ordered list of named passes. Each pass declares the
//! resources it reads and writes; [`RenderGraph::add_pass`] rejects a pass
//! whose inputs have not been written by an earlier pass, so the offscreen
//! transmission source is always rendered and mipmapped before the
//! transmissive pass samples it.

use super::draw_list::Bucket;
use crate::error::RenderGraphError;

/// Attachments passes read from and write to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassResource {
    /// Offscreen color/depth the transmission source is drawn into
    TransmissionColor,
    /// Mip chain of the transmission source, ready for sampling
    TransmissionMips,
    /// The presented framebuffer
    Surface,
}

/// Framebuffer a pass draws into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassTarget {
    TransmissionSource,
    Surface,
}

/// Work performed by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Environment cube or clear colour
    Environment,
    /// All drawables of one bucket
    Draw(Bucket),
    /// Build the transmission source mip chain
    GenerateMipmaps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPass {
    pub name: &'static str,
    pub target: PassTarget,
    pub kind: PassKind,
    pub reads: Vec<PassResource>,
    pub writes: Vec<PassResource>,
}

impl RenderPass {
    pub fn new(name: &'static str, target: PassTarget, kind: PassKind) -> Self {
        let writes = match target {
            PassTarget::TransmissionSource => vec![PassResource::TransmissionColor],
            PassTarget::Surface => vec![PassResource::Surface],
        };
        Self {
            name,
            target,
            kind,
            reads: Vec::new(),
            writes,
        }
    }

    pub fn reads(mut self, resource: PassResource) -> Self {
        self.reads.push(resource);
        self
    }

    /// Replace the declared outputs
    pub fn writes(mut self, resources: &[PassResource]) -> Self {
        self.writes = resources.to_vec();
        self
    }
}

/// Validated, ordered pass list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderGraph {
    passes: Vec<RenderPass>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pass after checking its inputs are already produced
    pub fn add_pass(&mut self, pass: RenderPass) -> Result<(), RenderGraphError> {
        if self.passes.iter().any(|p| p.name == pass.name) {
            return Err(RenderGraphError::DuplicatePass(pass.name));
        }
        for &resource in &pass.reads {
            let written = self.passes.iter().any(|p| p.writes.contains(&resource));
            if !written {
                return Err(RenderGraphError::UnwrittenInput {
                    pass: pass.name,
                    resource,
                });
            }
        }
        self.passes.push(pass);
        Ok(())
    }

    /// Standard frame: an offscreen transmission source when `transmission`
    /// is set, then environment, opaque, transmissive and transparent on the
    /// surface.
    pub fn frame(transmission: bool) -> Result<Self, RenderGraphError> {
        use PassKind::*;
        use PassTarget::*;

        let mut graph = Self::new();
        if transmission {
            graph.add_pass(RenderPass::new("transmission environment", TransmissionSource, Environment))?;
            graph.add_pass(RenderPass::new(
                "transmission opaque",
                TransmissionSource,
                Draw(Bucket::Opaque),
            ))?;
            graph.add_pass(RenderPass::new(
                "transmission transparent",
                TransmissionSource,
                Draw(Bucket::Transparent),
            ))?;
            graph.add_pass(
                RenderPass::new("transmission mipmaps", TransmissionSource, GenerateMipmaps)
                    .reads(PassResource::TransmissionColor)
                    .writes(&[PassResource::TransmissionMips]),
            )?;
        }

        graph.add_pass(RenderPass::new("environment", Surface, Environment))?;
        graph.add_pass(RenderPass::new("opaque", Surface, Draw(Bucket::Opaque)))?;
        if transmission {
            graph.add_pass(
                RenderPass::new("transmissive", Surface, Draw(Bucket::Transmissive))
                    .reads(PassResource::TransmissionMips),
            )?;
        }
        graph.add_pass(RenderPass::new("transparent", Surface, Draw(Bucket::Transparent)))?;
        Ok(graph)
    }

    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(graph: &RenderGraph) -> Vec<&'static str> {
        graph.passes().iter().map(|p| p.name).collect()
    }

    #[test]
    fn frame_without_transmission_is_surface_only() {
        let graph = RenderGraph::frame(false).unwrap();
        assert_eq!(names(&graph), vec!["environment", "opaque", "transparent"]);
        assert!(graph.passes().iter().all(|p| p.target == PassTarget::Surface));
    }

    #[test]
    fn transmission_source_precedes_transmissive() {
        let graph = RenderGraph::frame(true).unwrap();
        assert_eq!(
            names(&graph),
            vec![
                "transmission environment",
                "transmission opaque",
                "transmission transparent",
                "transmission mipmaps",
                "environment",
                "opaque",
                "transmissive",
                "transparent",
            ]
        );
    }

    #[test]
    fn reading_before_writing_is_rejected() {
        let mut graph = RenderGraph::new();
        let err = graph
            .add_pass(
                RenderPass::new("transmissive", PassTarget::Surface, PassKind::Draw(Bucket::Transmissive))
                    .reads(PassResource::TransmissionMips),
            )
            .unwrap_err();
        assert_eq!(
            err,
            RenderGraphError::UnwrittenInput {
                pass: "transmissive",
                resource: PassResource::TransmissionMips,
            }
        );
        assert!(graph.is_empty());
    }

    #[test]
    fn mipmaps_must_follow_offscreen_draws() {
        let mut graph = RenderGraph::new();
        let mipmaps = RenderPass::new(
            "transmission mipmaps",
            PassTarget::TransmissionSource,
            PassKind::GenerateMipmaps,
        )
        .reads(PassResource::TransmissionColor)
        .writes(&[PassResource::TransmissionMips]);
        assert!(graph.add_pass(mipmaps.clone()).is_err());

        graph
            .add_pass(RenderPass::new(
                "transmission opaque",
                PassTarget::TransmissionSource,
                PassKind::Draw(Bucket::Opaque),
            ))
            .unwrap();
        graph.add_pass(mipmaps.clone()).unwrap();
        assert_eq!(
            graph.add_pass(mipmaps),
            Err(RenderGraphError::DuplicatePass("transmission mipmaps"))
        );
    }
}
