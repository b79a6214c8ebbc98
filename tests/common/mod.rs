//! Recording fakes for the allocator and kernel seams.

#![allow(dead_code)]

use std::collections::BTreeSet;

use viso_bloom::{
    BloomError, BufferAllocator, Image, ImageDesc, LazyProgram, PassInputs, PassKernel, PassKind,
    PassParams,
};

pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const SOURCE_ID: u32 = 1;
pub const DESTINATION_ID: u32 = 2;

/// Storage-free image: identity is the id.
#[derive(Debug, PartialEq, Eq)]
pub struct FakeImage {
    pub id: u32,
    pub desc: ImageDesc,
}

impl Image for FakeImage {
    fn desc(&self) -> ImageDesc {
        self.desc
    }

    fn aliases(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

pub fn source(width: u32, height: u32) -> FakeImage {
    FakeImage {
        id: SOURCE_ID,
        desc: ImageDesc::new(width, height, FORMAT),
    }
}

pub fn destination(width: u32, height: u32) -> FakeImage {
    FakeImage {
        id: DESTINATION_ID,
        desc: ImageDesc::new(width, height, FORMAT),
    }
}

/// Counts acquires and releases, and can fail the n-th acquire.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    pub acquired: Vec<ImageDesc>,
    pub released: usize,
    pub outstanding: BTreeSet<u32>,
    /// 1-based index of the acquire that fails.
    pub fail_on_acquire: Option<usize>,
    /// Reported by the next `take_release_fault`.
    pub release_fault: Option<String>,
    next_id: u32,
}

impl CountingAllocator {
    pub fn failing_on(nth: usize) -> Self {
        Self {
            fail_on_acquire: Some(nth),
            ..Self::default()
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.outstanding.is_empty() && self.acquired.len() == self.released
    }
}

impl BufferAllocator for CountingAllocator {
    type Buffer = FakeImage;

    fn acquire(&mut self, desc: ImageDesc) -> Result<FakeImage, BloomError> {
        if self.fail_on_acquire == Some(self.acquired.len() + 1) {
            return Err(BloomError::AllocationFailure {
                desc,
                budget: 0,
                in_use: 0,
            });
        }
        self.acquired.push(desc);
        let id = 1000 + self.next_id;
        self.next_id += 1;
        assert!(self.outstanding.insert(id), "handle {id} issued twice");
        Ok(FakeImage { id, desc })
    }

    fn release(&mut self, buffer: FakeImage) {
        assert!(
            self.outstanding.remove(&buffer.id),
            "handle {} released but not outstanding",
            buffer.id
        );
        self.released += 1;
    }

    fn take_release_fault(&mut self) -> Option<BloomError> {
        self.release_fault
            .take()
            .map(BloomError::InvariantViolation)
    }
}

/// One recorded `apply` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: PassKind,
    pub primary: (u32, ImageDesc),
    pub secondary: Option<(u32, ImageDesc)>,
    pub threshold: Option<f32>,
    pub destination: (u32, ImageDesc),
}

impl Call {
    /// The call without buffer identities, for comparing runs.
    pub fn shape(&self) -> (PassKind, ImageDesc, Option<ImageDesc>, ImageDesc) {
        (
            self.kind,
            self.primary.1,
            self.secondary.map(|s| s.1),
            self.destination.1,
        )
    }
}

/// Records every pass; can refuse to build or fail a given pass.
#[derive(Default)]
pub struct RecordingKernel {
    pub configured: bool,
    pub broken_program: bool,
    pub build_attempts: usize,
    pub calls: Vec<Call>,
    /// Fail the first pass of this kind.
    pub fail_on: Option<PassKind>,
    pub flushes: usize,
    pub discards: usize,
    pub teardowns: usize,
    program: LazyProgram<()>,
}

impl RecordingKernel {
    pub fn configured() -> Self {
        Self {
            configured: true,
            ..Self::default()
        }
    }

    pub fn kinds(&self) -> Vec<PassKind> {
        self.calls.iter().map(|c| c.kind).collect()
    }

    pub fn calls_of(&self, kind: PassKind) -> Vec<&Call> {
        self.calls.iter().filter(|c| c.kind == kind).collect()
    }
}

impl PassKernel for RecordingKernel {
    type Image = FakeImage;

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn prepare(&mut self) -> Result<(), BloomError> {
        let broken = self.broken_program;
        let attempts = &mut self.build_attempts;
        let _ = self.program.get_or_build(|| {
            *attempts += 1;
            if broken {
                Err("fs_prefilter: missing entry point".to_owned())
            } else {
                Ok(())
            }
        })?;
        Ok(())
    }

    fn apply(
        &mut self,
        kind: PassKind,
        inputs: PassInputs<'_, FakeImage>,
        params: PassParams,
        destination: &FakeImage,
    ) -> Result<(), BloomError> {
        let _ = self.program.get_mut()?;
        assert_eq!(inputs.len(), kind.input_count(), "{kind:?} input count");
        if self.fail_on == Some(kind) {
            return Err(BloomError::InvariantViolation(format!("{kind:?} failed")));
        }
        self.calls.push(Call {
            kind,
            primary: (inputs.primary.id, inputs.primary.desc),
            secondary: inputs.secondary.map(|s| (s.id, s.desc)),
            threshold: params.threshold,
            destination: (destination.id, destination.desc),
        });
        Ok(())
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn discard(&mut self) {
        self.discards += 1;
    }

    fn teardown(&mut self) {
        self.teardowns += 1;
        self.program.reset();
    }
}
