//! batch conversion drivers
//!
//! A failing item never aborts the rest of the queue: failures surface
//! through per-item events and the report, and the returned future always
//! resolves exactly once after every item settles.
use crate::{
    config::ConversionConfig,
    engine::{ConvertOut, ConvertOutput},
    error::Error,
    ffmpeg::Ffmpeg,
    progress::Progress,
};
use futures_util::StreamExt as _;
use tokio::sync::mpsc;

/// Per-item observation during a batch run.
#[derive(Debug)]
pub enum BatchEvent<'a> {
    /// The item's process spawned; carries the display command.
    Started(&'a str),
    Progress(Progress),
    Completed,
    Failed(&'a Error),
}

/// Aggregate outcome of a batch, one entry per input config.
#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<Result<ConvertOutput, Error>>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

enum ItemEvent {
    Started(String),
    Progress(Progress),
}

/// Run items one at a time, each to completion before the next starts.
pub(crate) async fn run_sequential(
    ffmpeg: &Ffmpeg,
    configs: Vec<ConversionConfig>,
    mut on_event: impl FnMut(usize, BatchEvent<'_>),
) -> BatchReport {
    let mut results = Vec::with_capacity(configs.len());
    for (index, config) in configs.into_iter().enumerate() {
        let result = run_one(ffmpeg, config, |event| match event {
            ItemEvent::Started(command) => on_event(index, BatchEvent::Started(&command)),
            ItemEvent::Progress(progress) => on_event(index, BatchEvent::Progress(progress)),
        })
        .await;
        match &result {
            Ok(_) => on_event(index, BatchEvent::Completed),
            Err(err) => on_event(index, BatchEvent::Failed(err)),
        }
        results.push(result);
    }
    BatchReport { results }
}

/// Run items with at most `max_concurrent` engines in flight. Per-item
/// events arrive in no guaranteed cross-item order.
pub(crate) async fn run_parallel(
    ffmpeg: &Ffmpeg,
    configs: Vec<ConversionConfig>,
    max_concurrent: usize,
    mut on_event: impl FnMut(usize, BatchEvent<'_>),
) -> BatchReport {
    let total = configs.len();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let items: Vec<_> = configs
        .into_iter()
        .enumerate()
        .map(|(index, config)| {
            let tx = tx.clone();
            async move {
                let result = run_one(ffmpeg, config, |event| {
                    let _ = tx.send((index, event));
                })
                .await;
                (index, result)
            }
        })
        .collect();
    drop(tx);
    let mut in_flight =
        futures_util::stream::iter(items).buffer_unordered(max_concurrent.max(1));

    let mut results: Vec<Option<Result<ConvertOutput, Error>>> =
        (0..total).map(|_| None).collect();
    let mut drained = false;
    loop {
        tokio::select! {
            item = in_flight.next(), if !drained => match item {
                Some((index, result)) => {
                    match &result {
                        Ok(_) => on_event(index, BatchEvent::Completed),
                        Err(err) => on_event(index, BatchEvent::Failed(err)),
                    }
                    results[index] = Some(result);
                }
                None => drained = true,
            },
            event = rx.recv() => match event {
                Some((index, ItemEvent::Started(command))) => {
                    on_event(index, BatchEvent::Started(&command));
                }
                Some((index, ItemEvent::Progress(progress))) => {
                    on_event(index, BatchEvent::Progress(progress));
                }
                // all senders dropped once every item future completed
                None => break,
            },
        }
    }

    BatchReport {
        results: results.into_iter().flatten().collect(),
    }
}

async fn run_one(
    ffmpeg: &Ffmpeg,
    config: ConversionConfig,
    mut emit: impl FnMut(ItemEvent),
) -> Result<ConvertOutput, Error> {
    let mut conversion = ffmpeg.convert(config).await?;
    let mut output = None;
    while let Some(event) = conversion.next().await {
        match event? {
            ConvertOut::Start(command) => emit(ItemEvent::Started(command)),
            ConvertOut::Progress(progress) => emit(ItemEvent::Progress(progress)),
            ConvertOut::Done(out) => output = Some(out),
        }
    }
    output.ok_or_else(|| Error::ExecutionFailed {
        command: String::new(),
        detail: "conversion ended without a terminal event".to_owned(),
        stderr: String::new(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Output;
    use std::path::Path;

    fn broken_ffmpeg() -> Ffmpeg {
        Ffmpeg::with_paths(
            Path::new("/definitely/not/a/real/ffmpeg"),
            Path::new("/definitely/not/a/real/ffprobe"),
        )
    }

    fn configs(n: usize) -> Vec<ConversionConfig> {
        (0..n)
            .map(|i| ConversionConfig::new(format!("in{i}.mp4").as_str(), Output::from("out.mp4")))
            .collect()
    }

    /// A failing item must not abort the rest; the report covers all items.
    #[tokio::test]
    async fn sequential_tolerates_per_item_failures() {
        let ffmpeg = broken_ffmpeg();
        let mut failures = Vec::new();
        let report = run_sequential(&ffmpeg, configs(3), |index, event| {
            if let BatchEvent::Failed(_) = event {
                failures.push(index);
            }
        })
        .await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failed(), 3);
        assert_eq!(report.succeeded(), 0);
        assert!(!report.all_succeeded());
        assert_eq!(failures, [0, 1, 2]);
    }

    #[tokio::test]
    async fn parallel_settles_every_item() {
        let ffmpeg = broken_ffmpeg();
        let mut failures = Vec::new();
        let report = run_parallel(&ffmpeg, configs(3), 2, |index, event| {
            if let BatchEvent::Failed(_) = event {
                failures.push(index);
            }
        })
        .await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failed(), 3);
        failures.sort_unstable();
        assert_eq!(failures, [0, 1, 2]);
    }
}
