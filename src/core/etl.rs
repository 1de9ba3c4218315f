use crate::core::Pipeline;
use crate::domain::model::RunReport;
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::PhaseMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: PhaseMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: PhaseMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("🚀 Starting ETL process...");
        self.monitor.log_phase("start");

        // Extract
        let extracted_files = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} file(s)", extracted_files.len());
        self.monitor.log_phase("extract");
        if extracted_files.is_empty() {
            tracing::warn!("No data files were successfully extracted. Skipping transformation and load.");
            return Err(EtlError::NoData {
                stage: "extract".to_string(),
            });
        }

        // Transform
        let output = self.pipeline.transform(extracted_files.clone()).await?;
        tracing::info!("🔄 Transformed {} row(s)", output.dataset.len());
        self.monitor.log_phase("transform");
        if output.is_empty() {
            tracing::warn!("Transformation resulted in no data. Skipping load.");
            return Err(EtlError::NoData {
                stage: "transform".to_string(),
            });
        }

        match output.estimated_travel_time_seconds {
            Some(seconds) => tracing::info!(
                "⏱️ Estimated Travel Time for Route: {:.2} seconds ({:.2} minutes)",
                seconds,
                seconds / 60.0
            ),
            None => tracing::info!("Could not estimate travel time from sampled points."),
        }

        // Load
        let load = self.pipeline.load(&output).await?;
        tracing::info!(
            "💾 Loaded {} row(s) into '{}' ({})",
            load.rows_loaded,
            load.table_name,
            load.database_path
        );
        self.monitor.log_phase("load");
        self.monitor.log_summary();

        tracing::info!("✅ ETL process completed.");
        Ok(RunReport {
            extracted_files,
            rows_transformed: output.dataset.len(),
            averages: output.averages,
            estimated_travel_time_seconds: output.estimated_travel_time_seconds,
            load,
        })
    }
}
