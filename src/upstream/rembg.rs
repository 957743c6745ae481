//! Background removal through a rembg HTTP server.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use super::{endpoint, http_client, snippet, transport_error};
use crate::config::SegmentationConfig;
use crate::error::{PipelineError, Stage};

/// Wraps the segmentation service. Callers decide whether to call it.
#[derive(Clone, Debug)]
pub struct BackgroundRemover {
    config: SegmentationConfig,
    client: reqwest::Client,
}

impl BackgroundRemover {
    /// Creates a remover; no request is made until [`Self::remove_background`].
    pub fn new(config: &SegmentationConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            config: config.clone(),
            client: http_client(config.timeout)?,
        })
    }

    /// Returns a copy of `raster` whose background pixels have alpha 0.
    ///
    /// Only the alpha channel of the service's cutout is used, colour
    /// channels always come from `raster`.
    pub async fn remove_background(&self, raster: &RgbaImage) -> Result<RgbaImage, PipelineError> {
        let mut upload = Cursor::new(Vec::new());
        raster
            .write_to(&mut upload, ImageFormat::Png)
            .map_err(|err| PipelineError::Segmentation(format!("failed to prepare upload: {err}")))?;

        let url = endpoint(&self.config.base_url, "api/remove")
            .map_err(|err| PipelineError::Segmentation(err.to_string()))?;

        let part = Part::bytes(upload.into_inner())
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|err| PipelineError::Segmentation(err.to_string()))?;
        // rembg reads the model from the form, not the query string
        let form = Form::new()
            .text("model", self.config.model.clone())
            .part("file", part);

        debug!(
            "Removing background of {}x{} image",
            raster.width(),
            raster.height()
        );
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| transport_error(&err, Stage::Segmentation, PipelineError::Segmentation))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error(&err, Stage::Segmentation, PipelineError::Segmentation))?;
        if !status.is_success() {
            return Err(PipelineError::Segmentation(format!(
                "service error {status}: {}",
                snippet(&bytes)
            )));
        }

        let cutout = image::load_from_memory(&bytes)
            .map_err(|err| PipelineError::Segmentation(format!("unreadable cutout: {err}")))?
            .to_rgba8();
        apply_cutout_alpha(raster, &cutout)
    }
}

/// Copies `raster` and replaces its alpha with the alpha of `cutout`.
pub(crate) fn apply_cutout_alpha(
    raster: &RgbaImage,
    cutout: &RgbaImage,
) -> Result<RgbaImage, PipelineError> {
    if raster.dimensions() != cutout.dimensions() {
        return Err(PipelineError::Segmentation(format!(
            "cutout is {:?}, expected {:?}",
            cutout.dimensions(),
            raster.dimensions()
        )));
    }
    let mut output = raster.clone();
    for (pixel, mask) in output.pixels_mut().zip(cutout.pixels()) {
        pixel.0[3] = mask.0[3];
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use mockito::Matcher;
    use std::time::Duration;
    use url::Url;

    fn config(base_url: &str) -> SegmentationConfig {
        SegmentationConfig {
            base_url: Url::parse(base_url).unwrap(),
            model: "u2net".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn png(image: &RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn cutout_alpha_keeps_source_colours() {
        let raster = RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 255]));
        let mut cutout = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        cutout.put_pixel(1, 0, Rgba([99, 99, 99, 200]));

        let out = apply_cutout_alpha(&raster, &cutout).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgba([10, 20, 30, 0]));
        assert_eq!(out.get_pixel(1, 0), &Rgba([10, 20, 30, 200]));
    }

    #[test]
    fn mismatched_cutout_is_rejected() {
        let raster = RgbaImage::new(2, 2);
        let cutout = RgbaImage::new(3, 2);
        assert!(matches!(
            apply_cutout_alpha(&raster, &cutout),
            Err(PipelineError::Segmentation(_))
        ));
    }

    #[tokio::test]
    async fn remove_background_uses_service_mask() {
        let raster = RgbaImage::from_pixel(4, 4, Rgba([200, 100, 50, 255]));
        let mut cutout = RgbaImage::new(4, 4);
        cutout.put_pixel(1, 1, Rgba([200, 100, 50, 255]));

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/remove")
            .match_body(Matcher::Regex(
                "name=\"model\"\r\n\r\nu2net\r\n".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(png(&cutout))
            .create_async()
            .await;

        let remover = BackgroundRemover::new(&config(&server.url())).unwrap();
        let out = remover.remove_background(&raster).await.unwrap();
        assert_eq!(out.get_pixel(1, 1), &Rgba([200, 100, 50, 255]));
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn service_failure_is_a_segmentation_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/remove")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let remover = BackgroundRemover::new(&config(&server.url())).unwrap();
        let raster = RgbaImage::new(2, 2);
        match remover.remove_background(&raster).await {
            Err(PipelineError::Segmentation(msg)) => assert!(msg.contains("model not loaded")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_response_is_a_segmentation_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/remove")
            .with_status(200)
            .with_body("not a png")
            .create_async()
            .await;

        let remover = BackgroundRemover::new(&config(&server.url())).unwrap();
        let raster = RgbaImage::new(2, 2);
        assert!(matches!(
            remover.remove_background(&raster).await,
            Err(PipelineError::Segmentation(_))
        ));
    }

    #[tokio::test]
    async fn slow_service_is_a_segmentation_timeout() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/remove")
            .with_status(200)
            .with_chunked_body(|writer| {
                std::thread::sleep(Duration::from_millis(1500));
                writer.write_all(b"late")
            })
            .create_async()
            .await;

        let mut cfg = config(&server.url());
        cfg.timeout = Duration::from_millis(300);
        let remover = BackgroundRemover::new(&cfg).unwrap();
        assert!(matches!(
            remover.remove_background(&RgbaImage::new(2, 2)).await,
            Err(PipelineError::Timeout(Stage::Segmentation))
        ));
    }
}
