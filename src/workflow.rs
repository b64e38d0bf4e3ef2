use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisFactory, AnalysisReport, AnalysisService, GeneratedThumbnail};
use crate::config::Config;
use crate::error::{Result, VidioError};
use crate::media::{MediaFactory, VideoSource};
use crate::progress::{CancellationToken, ProgressObserver};
use crate::sampler::FrameSampler;
use crate::state::AppState;

pub struct Workflow {
    config: Config,
    sampler: FrameSampler,
    analysis: Option<Box<dyn AnalysisService>>,
}

impl Workflow {
    /// Build the default ffmpeg + Gemini workflow.
    ///
    /// A missing API key is not an error here; only the operations that need
    /// the analysis service fail.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let sampler = FrameSampler::new(
            MediaFactory::create_decoder(config.media.clone()),
            MediaFactory::create_encoder(),
            &config.sampler,
        );

        let analysis = match AnalysisFactory::create_service(config.analysis.clone()) {
            Ok(service) => Some(service),
            Err(e) => {
                debug!("Analysis service unavailable: {}", e);
                None
            }
        };

        Ok(Self::with_components(config, sampler, analysis))
    }

    /// Assemble a workflow from already constructed parts
    pub fn with_components(
        config: Config,
        sampler: FrameSampler,
        analysis: Option<Box<dyn AnalysisService>>,
    ) -> Self {
        Self { config, sampler, analysis }
    }

    fn analysis(&self) -> Result<&dyn AnalysisService> {
        match &self.analysis {
            Some(service) => Ok(service.as_ref()),
            None => Err(VidioError::Config(
                "No API key configured. Set analysis.api_key or GEMINI_API_KEY".to_string(),
            )),
        }
    }

    fn request_timeout(&self) -> Duration {
        self.config.analysis.request_timeout()
    }

    /// Sample a video, analyze the frames and record the result in `state`.
    ///
    /// On failure the state returns to idle with a localized message and the
    /// error is handed back to the caller.
    pub async fn analyze_video(
        &mut self,
        state: &mut AppState,
        source: &VideoSource,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport> {
        let result = self.run_analysis(state, source, observer, cancel).await;

        if let Err(e) = &result {
            warn!("Analysis of {} failed: {}", source.name(), e);
            state.fail(e.user_message(state.language));
        }
        result
    }

    async fn run_analysis(
        &mut self,
        state: &mut AppState,
        source: &VideoSource,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport> {
        source.validate_video()?;
        // Fail before decoding anything if there is nobody to send frames to
        self.analysis()?;

        info!("Processing video: {}", source.name());
        state.begin_upload();

        let sample_count = self.config.sampler.sample_count;
        let samples = self.sampler.sample(source, sample_count, observer, cancel).await?;

        state.begin_analysis();
        let language = state.language;
        let timeout = self.request_timeout();
        let images: Vec<_> = samples.into_samples().into_iter().map(|s| s.image).collect();

        let analysis = self.analysis()?;
        let report = cancel
            .run_until_cancelled(async {
                tokio::time::timeout(timeout, analysis.analyze(&images, language))
                    .await
                    .map_err(|_| VidioError::Timeout(timeout))?
            })
            .await?;

        state.complete_analysis(&source.name(), report.clone());
        info!("Analysis completed for {}", source.name());
        Ok(report)
    }

    /// Generate thumbnails for the selected prompts of `report` and save them in `output_dir`
    pub async fn generate_thumbnails(
        &self,
        report: &AnalysisReport,
        prompt_indices: &[usize],
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<(GeneratedThumbnail, PathBuf)>> {
        let prompts = prompt_indices
            .iter()
            .map(|&i| {
                report.thumbnail_prompts.get(i).map(|p| (i, p.clone())).ok_or_else(|| {
                    VidioError::InvalidArgument(format!(
                        "No thumbnail prompt #{} (report has {})",
                        i + 1,
                        report.thumbnail_prompts.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut generated = Vec::with_capacity(prompts.len());
        for (index, prompt) in prompts {
            let thumbnail = self.generate_thumbnail(&prompt, cancel).await?;
            let suffix = format!("{}-{}", thumbnail.id, index + 1);
            let path = thumbnail.image.save_to_dir(output_dir, &suffix).await?;
            info!("Saved thumbnail to {}", path.display());
            generated.push((thumbnail, path));
        }

        Ok(generated)
    }

    /// Generate a single thumbnail background for `prompt`
    pub async fn generate_thumbnail(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<GeneratedThumbnail> {
        let analysis = self.analysis()?;
        let timeout = self.request_timeout();
        let aspect_ratio = self.config.analysis.aspect_ratio.as_str();

        let image = cancel
            .run_until_cancelled(async {
                tokio::time::timeout(timeout, analysis.generate_image(prompt, aspect_ratio))
                    .await
                    .map_err(|_| VidioError::Timeout(timeout))?
            })
            .await?;

        Ok(GeneratedThumbnail {
            id: chrono::Utc::now().timestamp_millis().to_string(),
            prompt: prompt.to_string(),
            image,
        })
    }

    /// Sample a video and write each frame to `output_dir` as a JPEG
    pub async fn sample_to_dir(
        &mut self,
        source: &VideoSource,
        output_dir: &Path,
        sample_count: Option<usize>,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        source.validate_video()?;
        let sample_count = sample_count.unwrap_or(self.config.sampler.sample_count);
        let samples = self.sampler.sample(source, sample_count, observer, cancel).await?;

        fs::create_dir_all(output_dir).await?;

        let mut written = Vec::with_capacity(samples.len());
        for (index, sample) in samples.samples().iter().enumerate() {
            let path = output_dir.join(format!("frame_{:02}_{:.3}.jpg", index + 1, sample.timestamp));
            fs::write(&path, &sample.image.data).await?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }

        info!("Wrote {} frames to {}", written.len(), output_dir.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{sample_report, ScriptedAnalysis};
    use crate::progress::NoProgress;
    use crate::sampler::testing::{PassthroughEncoder, PatternDecoder};
    use crate::state::{AnalysisPhase, Language};
    use std::sync::{Arc, Mutex};

    struct SharedAnalysis(Arc<ScriptedAnalysis>);

    #[async_trait::async_trait]
    impl AnalysisService for SharedAnalysis {
        async fn analyze(
            &self,
            images: &[crate::media::StillImage],
            language: Language,
        ) -> Result<AnalysisReport> {
            self.0.analyze(images, language).await
        }

        async fn generate_image(
            &self,
            prompt: &str,
            aspect_ratio: &str,
        ) -> Result<crate::analysis::GeneratedImage> {
            self.0.generate_image(prompt, aspect_ratio).await
        }
    }

    struct Harness {
        workflow: Workflow,
        analysis: Arc<ScriptedAnalysis>,
        decoder_log: Arc<Mutex<crate::sampler::testing::DecoderLog>>,
        _dir: tempfile::TempDir,
        source: VideoSource,
    }

    fn harness(decoder: PatternDecoder, analysis: ScriptedAnalysis) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"not really a video").unwrap();

        let mut config = Config::default();
        config.sampler.seek_timeout_secs = 1;
        config.analysis.request_timeout_secs = 1;

        let decoder_log = decoder.log.clone();
        let sampler = FrameSampler::new(Box::new(decoder), Box::new(PassthroughEncoder), &config.sampler);
        let analysis = Arc::new(analysis);
        let workflow = Workflow::with_components(
            config,
            sampler,
            Some(Box::new(SharedAnalysis(analysis.clone()))),
        );

        Harness { workflow, analysis, decoder_log, _dir: dir, source: VideoSource::file(path) }
    }

    #[tokio::test]
    async fn test_analyze_video_records_project() {
        let mut h = harness(PatternDecoder::new(100.0), ScriptedAnalysis::default());
        let mut state = AppState::default();
        state.register("creator@example.com").unwrap();
        state.set_language(Language::Fr);

        let report = h.workflow
            .analyze_video(&mut state, &h.source, &NoProgress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report, sample_report());
        assert_eq!(*h.analysis.received.lock().unwrap(), vec![(10, Language::Fr)]);
        assert_eq!(state.phase, AnalysisPhase::Completed);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].video_name, "clip.mp4");
        assert_eq!(state.user.as_ref().unwrap().videos_uploaded_today, 1);
        assert_eq!(h.decoder_log.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    async fn test_malformed_analysis_resets_state() {
        let analysis = ScriptedAnalysis { fail_analysis: true, ..Default::default() };
        let mut h = harness(PatternDecoder::new(30.0), analysis);
        let mut state = AppState::default();
        state.register("creator@example.com").unwrap();

        let err = h.workflow
            .analyze_video(&mut state, &h.source, &NoProgress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VidioError::Analysis(_)));
        assert_eq!(state.phase, AnalysisPhase::Idle);
        assert_eq!(state.last_error.as_deref(), Some("Processing failed."));
        assert!(state.history.is_empty());
        assert_eq!(state.user.as_ref().unwrap().videos_uploaded_today, 0);
    }

    #[tokio::test]
    async fn test_slow_analysis_times_out() {
        let analysis = ScriptedAnalysis { delay: Some(Duration::from_secs(3600)), ..Default::default() };
        let mut h = harness(PatternDecoder::new(30.0), analysis);
        let mut state = AppState::default();

        let err = h.workflow
            .analyze_video(&mut state, &h.source, &NoProgress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VidioError::Timeout(_)));
        assert_eq!(state.phase, AnalysisPhase::Idle);
    }

    #[tokio::test]
    async fn test_decode_failure_skips_analysis() {
        let mut h = harness(PatternDecoder::new(0.0), ScriptedAnalysis::default());
        let mut state = AppState::default();

        let err = h.workflow
            .analyze_video(&mut state, &h.source, &NoProgress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VidioError::Decode(_)));
        assert!(h.analysis.received.lock().unwrap().is_empty());
        assert_eq!(state.last_error.as_deref(), Some("Please select a valid video file."));
    }

    #[tokio::test]
    async fn test_non_video_rejected_before_sampling() {
        let mut h = harness(PatternDecoder::new(30.0), ScriptedAnalysis::default());
        let mut state = AppState::default();
        let source = VideoSource::Bytes { name: "notes.txt".to_string(), data: vec![] };

        let err = h.workflow
            .analyze_video(&mut state, &source, &NoProgress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VidioError::InvalidArgument(_)));
        assert_eq!(h.decoder_log.lock().unwrap().opened, 0);
    }

    #[tokio::test]
    async fn test_missing_analysis_service_fails_fast() {
        let mut h = harness(PatternDecoder::new(30.0), ScriptedAnalysis::default());
        h.workflow.analysis = None;
        let mut state = AppState::default();

        let err = h.workflow
            .analyze_video(&mut state, &h.source, &NoProgress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VidioError::Config(_)));
        assert_eq!(h.decoder_log.lock().unwrap().opened, 0);
    }

    #[tokio::test]
    async fn test_generate_selected_thumbnails() {
        let h = harness(PatternDecoder::new(30.0), ScriptedAnalysis::default());
        let out = tempfile::tempdir().unwrap();

        let generated = h.workflow
            .generate_thumbnails(&sample_report(), &[1], out.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].0.prompt, "A runner at dawn");
        assert!(generated[0].1.exists());
        assert_eq!(*h.analysis.prompts.lock().unwrap(), vec!["A runner at dawn".to_string()]);
    }

    #[tokio::test]
    async fn test_thumbnail_index_out_of_range() {
        let h = harness(PatternDecoder::new(30.0), ScriptedAnalysis::default());
        let out = tempfile::tempdir().unwrap();

        let err = h.workflow
            .generate_thumbnails(&sample_report(), &[0, 5], out.path(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VidioError::InvalidArgument(_)));
        assert!(h.analysis.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let analysis = ScriptedAnalysis { fail_generation: true, ..Default::default() };
        let h = harness(PatternDecoder::new(30.0), analysis);

        let err = h.workflow
            .generate_thumbnail("a red car", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VidioError::Generation(_)));
    }

    #[tokio::test]
    async fn test_sample_to_dir_writes_frames() {
        let mut h = harness(PatternDecoder::new(9.0), ScriptedAnalysis::default());
        let out = tempfile::tempdir().unwrap();
        let frames_dir = out.path().join("frames");
        let source = h.source.clone();

        let written = h.workflow
            .sample_to_dir(&source, &frames_dir, Some(3), &NoProgress, &CancellationToken::new())
            .await
            .unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["frame_01_1.500.jpg", "frame_02_4.500.jpg", "frame_03_7.500.jpg"]);
        assert!(written.iter().all(|p| p.exists()));
    }
}
