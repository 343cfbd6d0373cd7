use crate::models::samples::SamplesMut;

/// Receives captured audio, one call per reclaimed buffer.
///
/// Runs on the engine's consumer thread. The view holds only the frames the
/// device recorded, in the negotiated layout, with 8-bit data already signed.
pub trait CaptureHandler {
    fn process(&mut self, samples: SamplesMut<'_>);
}

/// Supplies audio for playback, one call per free buffer.
///
/// The view arrives zeroed (silence) and is expected to be filled before
/// returning. 8-bit data is written signed; the engine converts it for the
/// device afterwards.
pub trait RenderHandler {
    fn render(&mut self, samples: SamplesMut<'_>);
}

impl<F> CaptureHandler for F
where
    F: FnMut(SamplesMut<'_>),
{
    fn process(&mut self, samples: SamplesMut<'_>) {
        self(samples)
    }
}

impl<F> RenderHandler for F
where
    F: FnMut(SamplesMut<'_>),
{
    fn render(&mut self, samples: SamplesMut<'_>) {
        self(samples)
    }
}
