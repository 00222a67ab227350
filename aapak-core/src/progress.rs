/// Phase reported through a [`ProgressHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressPhase {
    OpeningFile,
    ReadingHeader,
    WritingHeader,
    ReadingFAT,
    WritingFAT,
    ClosingFile,
    GeneratingDirectories,
}

/// Called synchronously with `(phase, step, maximum)`.
pub type ProgressHandler = Box<dyn FnMut(ProgressPhase, usize, usize) + Send>;

#[derive(Default)]
pub(crate) struct Progress {
    handler: Option<ProgressHandler>,
}

impl Progress {
    pub fn set(&mut self, handler: Option<ProgressHandler>) {
        self.handler = handler;
    }

    #[inline]
    pub fn report(&mut self, phase: ProgressPhase, step: usize, maximum: usize) {
        if let Some(handler) = &mut self.handler {
            handler(phase, step, maximum);
        }
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("handler", &self.handler.is_some())
            .finish()
    }
}
