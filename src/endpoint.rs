use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{DetectError, Result};

/// One entry of the `instances` batch sent to the endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Instance {
    /// Base64 image content.
    pub content: String,
}

impl Instance {
    pub fn from_image_bytes(image_bytes: &[u8]) -> Self {
        Self {
            content: STANDARD.encode(image_bytes),
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: &'a [Instance],
}

/// Body of an object-detection `:predict` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    #[serde(default)]
    pub predictions: Vec<ImagePrediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_model_id: Option<String>,
}

/// Detections for one submitted image, as parallel sequences.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImagePrediction {
    #[serde(default)]
    pub display_names: Vec<String>,
    #[serde(default, deserialize_with = "lenient_floats")]
    pub confidences: Vec<f64>,
    /// Normalized `[xmin, xmax, ymin, ymax]` per detection.
    #[serde(default, deserialize_with = "lenient_boxes")]
    pub bboxes: Vec<Vec<f64>>,
}

impl PredictionResponse {
    /// Detections of the single submitted image.
    pub fn first(&self) -> Result<&ImagePrediction> {
        self.predictions.first().ok_or(DetectError::EmptyPrediction)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Float(f64),
    Text(String),
}

impl Number {
    fn value(self) -> std::result::Result<f64, String> {
        match self {
            Number::Float(v) => Ok(v),
            Number::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("'{s}' is not a number")),
        }
    }
}

fn lenient_floats<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<Number>::deserialize(deserializer)?
        .into_iter()
        .map(|n| n.value().map_err(serde::de::Error::custom))
        .collect()
}

fn lenient_boxes<'de, D>(deserializer: D) -> std::result::Result<Vec<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<Vec<Number>>::deserialize(deserializer)?
        .into_iter()
        .map(|b| {
            b.into_iter()
                .map(|n| n.value().map_err(serde::de::Error::custom))
                .collect()
        })
        .collect()
}

/// A hosted model that answers `predict` for a batch of instances.
pub trait PredictionClient {
    fn predict(&self, instances: &[Instance]) -> Result<PredictionResponse>;
}

impl<T: PredictionClient + ?Sized> PredictionClient for &T {
    fn predict(&self, instances: &[Instance]) -> Result<PredictionResponse> {
        (**self).predict(instances)
    }
}

/// Vertex AI endpoint reached over its REST surface.
pub struct VertexEndpoint {
    agent: ureq::Agent,
    predict_url: Url,
    access_token: Option<String>,
}

impl VertexEndpoint {
    pub fn new(
        project_id: &str,
        location: &str,
        endpoint_id: &str,
        base_url: Option<&str>,
        access_token: Option<String>,
    ) -> Result<Self> {
        let base = match base_url {
            Some(url) => url.to_string(),
            None => format!("https://{location}-aiplatform.googleapis.com/"),
        };
        let bad_url = |e: url::ParseError| {
            DetectError::backend("prediction", format!("bad endpoint URL {base}: {e}"))
        };
        let predict_url = Url::parse(&base)
            .and_then(|b| {
                b.join(&format!(
                    "v1/{}:predict",
                    endpoint_path(project_id, location, endpoint_id)
                ))
            })
            .map_err(bad_url)?;
        Ok(Self {
            agent: ureq::AgentBuilder::new().build(),
            predict_url,
            access_token,
        })
    }

    pub fn predict_url(&self) -> &Url {
        &self.predict_url
    }
}

pub fn endpoint_path(project_id: &str, location: &str, endpoint_id: &str) -> String {
    format!("projects/{project_id}/locations/{location}/endpoints/{endpoint_id}")
}

impl PredictionClient for VertexEndpoint {
    fn predict(&self, instances: &[Instance]) -> Result<PredictionResponse> {
        debug!("POST {} with {} instance(s)", self.predict_url, instances.len());
        let mut request = self.agent.request_url("POST", &self.predict_url);
        if let Some(token) = &self.access_token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        let response = request
            .send_json(PredictRequest { instances })
            .map_err(|e| DetectError::from_http("prediction", e))?;
        response
            .into_json::<PredictionResponse>()
            .map_err(|e| DetectError::backend("prediction", format!("undecodable response: {e}")))
    }
}
