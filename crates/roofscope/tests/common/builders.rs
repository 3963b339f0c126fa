//! Builders for backend wire types used across the controller tests.

#![allow(dead_code)]

use roofscope::{
    Detection, ExecutionStatus, InlineUpload, Material, PhotoMetadata, UploadSlot, WorkflowStarted,
};

/// Builder for [`PhotoMetadata`] in the states the backend reports.
pub struct MetadataBuilder {
    inner: PhotoMetadata,
}

impl MetadataBuilder {
    /// A processing-state record for the given photo.
    pub fn new(photo_id: &str) -> Self {
        Self {
            inner: PhotoMetadata {
                photo_id: photo_id.to_string(),
                timestamp: Some("2026-08-01T10:00:00Z".to_string()),
                s3_key: Some(format!("photos/test/{}.jpg", photo_id)),
                user_id: None,
                status: ExecutionStatus::Processing,
                workflow_status: Some(ExecutionStatus::Processing),
                detections: vec![],
                materials: vec![],
                processing_time_ms: None,
                ai_provider: None,
                agent1_results: None,
                agent2_results: None,
                agent3_results: None,
                single_agent_results: None,
                overlay_url: None,
                report_url: None,
                single_agent_overlay_url: None,
                single_agent_report_url: None,
                error: None,
            },
        }
    }

    pub fn processing(mut self) -> Self {
        self.inner.status = ExecutionStatus::Processing;
        self.inner.workflow_status = Some(ExecutionStatus::Processing);
        self
    }

    pub fn completed(mut self) -> Self {
        self.inner.status = ExecutionStatus::Completed;
        self.inner.workflow_status = Some(ExecutionStatus::Completed);
        self
    }

    pub fn failed(mut self, error: &str) -> Self {
        self.inner.status = ExecutionStatus::Failed;
        self.inner.workflow_status = Some(ExecutionStatus::Failed);
        self.inner.error = Some(error.to_string());
        self
    }

    pub fn detection(mut self, detection: Detection) -> Self {
        self.inner.detections.push(detection);
        self
    }

    pub fn material(mut self, material: Material) -> Self {
        self.inner.materials.push(material);
        self
    }

    pub fn build(self) -> PhotoMetadata {
        self.inner
    }
}

pub fn upload_slot(photo_id: &str, s3_key: &str) -> UploadSlot {
    UploadSlot {
        photo_id: photo_id.to_string(),
        upload_url: format!("https://uploads.test/{}", photo_id),
        s3_key: s3_key.to_string(),
        expires_in: Some(3600),
    }
}

pub fn inline_upload(photo_id: &str, s3_key: &str) -> InlineUpload {
    InlineUpload {
        photo_id: photo_id.to_string(),
        s3_key: s3_key.to_string(),
    }
}

pub fn workflow_started(photo_id: &str) -> WorkflowStarted {
    WorkflowStarted {
        photo_id: photo_id.to_string(),
        execution_arn: Some(format!("arn:aws:states:exec:{}", photo_id)),
        start_date: None,
        workflow_status: Some(ExecutionStatus::Processing),
    }
}

pub fn hail_detection() -> Detection {
    Detection {
        kind: "roof_damage".to_string(),
        category: "hail".to_string(),
        confidence: 0.91,
        bbox: Some(vec![10, 20, 110, 140]),
        severity: Some("moderate".to_string()),
    }
}

pub fn shingle_material() -> Material {
    Material {
        kind: "shingles".to_string(),
        count: 12,
        unit: Some("bundles".to_string()),
        brand: None,
        confidence: 0.8,
    }
}
