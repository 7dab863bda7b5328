use crate::options::Run;
use anyhow::{Context, Result};
use glof::{
    artifact::DirArtifacts, geofence::Entity, notify::LogSink, record::MemoryResults,
    AnalysisRequest, Config, Orchestrator,
};
use log::info;
use raster::SampleMode;
use std::{fs::File, io::BufReader, path::Path, sync::Arc};

impl Run {
    pub fn run(&self) -> Result<()> {
        let config = self.config()?;
        let entities = match &self.entities {
            Some(path) => load_entities(path)?,
            None => Vec::new(),
        };
        info!("{} entities loaded", entities.len());

        let mode = if self.memmap {
            SampleMode::MemMap
        } else {
            SampleMode::InMem
        };
        let orchestrator = Orchestrator::builder()
            .config(config)
            .artifacts(Arc::new(DirArtifacts::new(self.root.clone(), mode)?))
            .results(Arc::new(MemoryResults::new()))
            .sink(Arc::new(LogSink))
            .entities(Arc::new(entities))
            .build()?;

        let record = orchestrator.run(&AnalysisRequest {
            image_1: self.image_1.clone(),
            image_2: self.image_2.clone(),
            dem: self.dem.clone(),
            date_1: self.date_1,
            date_2: self.date_2,
            seed: self.seed,
        });
        println!("{}", serde_json::to_string_pretty(&record)?);
        Ok(())
    }

    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
                Config::from_reader(BufReader::new(file))
                    .with_context(|| format!("parsing {path:?}"))?
            }
            None => Config::default(),
        };
        if let Some(threshold) = self.threshold {
            config.water_threshold = threshold;
        }
        if let Some(mode) = self.mode {
            config.alert.mode = mode.into();
        }
        Ok(config)
    }
}

fn load_entities(path: &Path) -> Result<Vec<Entity>> {
    let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
    let entities = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {path:?}"))?;
    Ok(entities)
}
