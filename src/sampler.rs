//! Deterministic frame sampling.
//!
//! A sampling pass splits the source duration into `n` equal slots and takes
//! one frame from the middle of each slot, so no sample lands exactly on the
//! first or last instant of the video.
//!
//! Seeks are issued strictly one after another: the decoder exposes a single
//! current frame, and the sampler holds it exclusively for the whole pass.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SamplerConfig;
use crate::error::{Result, VidioError};
use crate::media::{FrameEncoder, MediaDecoder, StillImage, VideoSource};
use crate::progress::{percent_complete, CancellationToken, ProgressObserver};

/// One timestamped still extracted from a video
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub image: StillImage,
}

/// The ordered samples produced by one pass over one video
#[derive(Debug, Clone)]
pub struct SampleSet {
    duration: f64,
    samples: Vec<Sample>,
}

impl SampleSet {
    /// Duration of the source in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// Upper bound on frames per pass; each frame costs one decoder seek
pub const MAX_SAMPLE_COUNT: usize = 1000;

/// Slot-centred timestamps: `duration/n * i + duration/(2n)` for `i` in `0..n`
pub fn sample_timestamps(duration: f64, sample_count: usize) -> Vec<f64> {
    let slot = duration / sample_count as f64;
    (0..sample_count)
        .map(|i| slot * i as f64 + slot / 2.0)
        .collect()
}

/// Samples evenly spaced frames through a decoder/encoder pair
pub struct FrameSampler {
    decoder: Box<dyn MediaDecoder>,
    encoder: Box<dyn FrameEncoder>,
    quality: u8,
    seek_timeout: Duration,
}

impl FrameSampler {
    pub fn new(
        decoder: Box<dyn MediaDecoder>,
        encoder: Box<dyn FrameEncoder>,
        config: &SamplerConfig,
    ) -> Self {
        Self {
            decoder,
            encoder,
            quality: config.jpeg_quality,
            seek_timeout: config.seek_timeout(),
        }
    }

    /// Take `sample_count` frames from `source`.
    ///
    /// Either every sample is returned or none is. The source is closed on
    /// every exit path, including cancellation.
    pub async fn sample(
        &mut self,
        source: &VideoSource,
        sample_count: usize,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<SampleSet> {
        if sample_count == 0 {
            return Err(VidioError::InvalidArgument(
                "sample_count must be at least 1".to_string(),
            ));
        }
        if sample_count > MAX_SAMPLE_COUNT {
            return Err(VidioError::InvalidArgument(format!(
                "sample_count must be at most {}, got {}",
                MAX_SAMPLE_COUNT, sample_count
            )));
        }
        if cancel.is_cancelled() {
            return Err(VidioError::Cancelled);
        }

        let result = self.run(source, sample_count, observer, cancel).await;
        self.decoder.close().await;

        match &result {
            Ok(set) => info!("Sampled {} frames from {}", set.len(), source.name()),
            Err(e) => warn!("Sampling {} failed: {}", source.name(), e),
        }
        result
    }

    async fn run(
        &mut self,
        source: &VideoSource,
        sample_count: usize,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<SampleSet> {
        debug!("Opening {}", source.name());
        let decoder = self.decoder.as_mut();
        let info = cancel.run_until_cancelled(decoder.open(source)).await?;

        if !info.duration.is_finite() || info.duration <= 0.0 {
            return Err(VidioError::Decode(format!(
                "Unusable duration {} for {}",
                info.duration,
                source.name()
            )));
        }

        let timestamps = sample_timestamps(info.duration, sample_count);
        let mut samples = Vec::with_capacity(sample_count);

        for (i, &timestamp) in timestamps.iter().enumerate() {
            debug!("Seeking to {:.3}s ({}/{})", timestamp, i + 1, sample_count);
            let timeout = self.seek_timeout;
            cancel.run_until_cancelled(async {
                match tokio::time::timeout(timeout, decoder.seek_to(timestamp)).await {
                    Ok(result) => result,
                    Err(_) => Err(VidioError::Seek {
                        timestamp,
                        reason: format!("Frame not ready within {:?}", timeout),
                    }),
                }
            })
            .await?;

            debug!("Encoding frame at {:.3}s", timestamp);
            let image = self.encoder.encode(decoder.current_frame()?, self.quality)?;
            samples.push(Sample { timestamp, image });

            observer.on_progress(percent_complete(i + 1, sample_count));
        }

        Ok(SampleSet {
            duration: info.duration,
            samples,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory decoder and encoder used across the crate's tests.

    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::error::{Result, VidioError};
    use crate::media::{FrameEncoder, MediaDecoder, MediaInfo, RawFrame, StillImage, VideoSource};

    /// Observable decoder state shared with the test body
    #[derive(Debug, Default)]
    pub struct DecoderLog {
        pub opened: usize,
        pub closed: usize,
        pub seeks: Vec<f64>,
    }

    /// Decoder whose frame at time `t` is a 1x1 pixel carrying `t` in milliseconds
    pub struct PatternDecoder {
        pub duration: f64,
        pub fail_open: bool,
        pub stall_on_seek: Option<usize>,
        pub fail_on_seek: Option<usize>,
        pub log: Arc<Mutex<DecoderLog>>,
        current: Option<RawFrame>,
    }

    impl PatternDecoder {
        pub fn new(duration: f64) -> Self {
            Self {
                duration,
                fail_open: false,
                stall_on_seek: None,
                fail_on_seek: None,
                log: Arc::new(Mutex::new(DecoderLog::default())),
                current: None,
            }
        }

        pub fn encode_timestamp(timestamp: f64) -> Vec<u8> {
            let millis = (timestamp * 1000.0).round() as u32;
            millis.to_be_bytes()[1..].to_vec()
        }

        pub fn decode_timestamp(data: &[u8]) -> f64 {
            let millis = u32::from_be_bytes([0, data[0], data[1], data[2]]);
            millis as f64 / 1000.0
        }
    }

    #[async_trait]
    impl MediaDecoder for PatternDecoder {
        async fn open(&mut self, _source: &VideoSource) -> Result<MediaInfo> {
            self.log.lock().unwrap().opened += 1;
            if self.fail_open {
                return Err(VidioError::Decode("unsupported container".to_string()));
            }
            Ok(MediaInfo { duration: self.duration, width: 1, height: 1 })
        }

        async fn seek_to(&mut self, timestamp: f64) -> Result<()> {
            let index = {
                let mut log = self.log.lock().unwrap();
                log.seeks.push(timestamp);
                log.seeks.len() - 1
            };
            if self.stall_on_seek == Some(index) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_on_seek == Some(index) {
                return Err(VidioError::Seek { timestamp, reason: "corrupt packet".to_string() });
            }
            self.current = Some(RawFrame {
                width: 1,
                height: 1,
                data: Self::encode_timestamp(timestamp),
            });
            Ok(())
        }

        fn current_frame(&self) -> Result<&RawFrame> {
            self.current.as_ref().ok_or_else(|| VidioError::Media("no frame".to_string()))
        }

        async fn close(&mut self) {
            self.current = None;
            self.log.lock().unwrap().closed += 1;
        }
    }

    /// Stores the raw pixels unchanged as the "encoded" image
    pub struct PassthroughEncoder;

    impl FrameEncoder for PassthroughEncoder {
        fn encode(&self, frame: &RawFrame, _quality: u8) -> Result<StillImage> {
            Ok(StillImage {
                mime_type: "image/x-raw-rgb".to_string(),
                width: frame.width,
                height: frame.height,
                data: frame.data.clone(),
            })
        }
    }
}
