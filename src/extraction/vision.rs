//! Vision-language captioning for cards that are mostly diagrams, charts,
//! or tables. The caption is plain prose and is chunked flat.

use async_trait::async_trait;
use tracing::info;

use umesao_core::error::Result;
use umesao_core::extract::{ImageUpload, TextExtractor};
use umesao_core::models::ExtractionMethod;

use crate::config::ExtractionConfig;
use crate::openai::ChatClient;

pub struct VisionCaptioner {
    chat: ChatClient,
    model: String,
}

impl VisionCaptioner {
    pub fn new(config: &ExtractionConfig, chat: ChatClient) -> Self {
        Self {
            chat,
            model: config.vision_model.clone(),
        }
    }
}

#[async_trait]
impl TextExtractor for VisionCaptioner {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Vision
    }

    async fn extract(&self, image: &ImageUpload) -> Result<String> {
        let caption = self
            .chat
            .caption_image(&self.model, &image.bytes, &image.content_type)
            .await?;
        info!(file = %image.file_name, model = %self.model, "captioned image");
        Ok(caption)
    }
}
