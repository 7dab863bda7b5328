use crate::options::{Classify, Index, Trace};
use anyhow::Result;
use glof::{
    artifact::flow_path_feature,
    flow::{path_slope_degrees, FlowPath},
    index::{self, IndexFormula},
    risk,
};
use raster::{hgt, Raster, SampleMode};
use serde::Serialize;
use std::{ffi::OsStr, path::Path};

impl Index {
    pub fn run(&self) -> Result<()> {
        let image = open(&self.input)?;
        let grid = index::compute(&image, IndexFormula::new(self.green, self.nir))?;
        let area = index::lake_area(&grid, self.threshold);
        if let Some(out) = &self.out {
            grid.grid().save(out)?;
        }

        #[derive(Serialize)]
        struct Summary {
            formula: String,
            threshold: f64,
            lake_area_m2: f64,
            centroid: Option<[f64; 2]>,
        }
        let summary = Summary {
            formula: grid.formula().to_string(),
            threshold: self.threshold,
            lake_area_m2: area,
            centroid: index::water_centroid(&grid, self.threshold).map(|c| [c.x, c.y]),
        };
        println!("{}", serde_json::to_string(&summary)?);
        Ok(())
    }
}

impl Trace {
    pub fn run(&self) -> Result<()> {
        let dem = open(&self.dem)?;
        let path = FlowPath::builder()
            .seed(self.seed)
            .max_steps(self.max_steps)
            .build(&dem)?;
        let mut feature = flow_path_feature(&path);
        feature.set_property("termination", serde_json::to_value(path.termination())?);
        if let Some(slope) = path_slope_degrees(&dem, &path) {
            feature.set_property("slope_degrees", slope);
        }
        println!("{feature}");
        Ok(())
    }
}

impl Classify {
    pub fn run(&self) -> Result<()> {
        println!("{}", risk::assess(self.volume, self.slope));
        Ok(())
    }
}

fn open(path: &Path) -> Result<Raster> {
    let raster = if Some("hgt") == path.extension().and_then(OsStr::to_str) {
        hgt::load(path)?
    } else {
        Raster::open(path, SampleMode::MemMap)?
    };
    Ok(raster)
}
