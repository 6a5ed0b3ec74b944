use tracing::{error, info};

use crate::endpoint::{Instance, PredictionClient, PredictionResponse};
use crate::error::{DetectError, Result};
use crate::storage::{ObjectStore, StorageUri};

/// Result of one fetch-and-predict round: the endpoint's answer and the
/// exact bytes that were sent to it.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub uri: StorageUri,
    pub response: PredictionResponse,
    pub image_bytes: Vec<u8>,
}

/// Downloads an image and runs it through the hosted detector.
pub struct Predictor<S, C> {
    store: S,
    client: C,
}

impl<S: ObjectStore, C: PredictionClient> Predictor<S, C> {
    pub fn new(store: S, client: C) -> Self {
        Self { store, client }
    }

    /// `Ok(None)` when `source_uri` is malformed; nothing is fetched then.
    /// Backend failures propagate untouched.
    pub fn predict(&self, source_uri: &str) -> Result<Option<Prediction>> {
        let uri = match StorageUri::parse(source_uri) {
            Ok(uri) => uri,
            Err(e @ DetectError::InvalidUri(_)) => {
                error!("{e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let image_bytes = self.store.download(&uri)?;
        info!("Downloaded {uri} ({} bytes)", image_bytes.len());

        let instances = [Instance::from_image_bytes(&image_bytes)];
        let response = self.client.predict(&instances)?;
        info!("Prediction successful!");

        Ok(Some(Prediction {
            uri,
            response,
            image_bytes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::endpoint::ImagePrediction;

    struct FakeStore {
        calls: Cell<usize>,
        bytes: Vec<u8>,
    }

    impl ObjectStore for FakeStore {
        fn download(&self, uri: &StorageUri) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            assert_eq!(uri.bucket, "drawings");
            Ok(self.bytes.clone())
        }
    }

    struct FakeClient {
        seen: RefCell<Vec<Instance>>,
        fail: bool,
    }

    impl PredictionClient for FakeClient {
        fn predict(&self, instances: &[Instance]) -> Result<PredictionResponse> {
            self.seen.borrow_mut().extend_from_slice(instances);
            if self.fail {
                return Err(DetectError::backend("prediction", "503 unavailable"));
            }
            Ok(PredictionResponse {
                predictions: vec![ImagePrediction {
                    display_names: vec!["1".into()],
                    confidences: vec![0.8],
                    bboxes: vec![vec![0.0, 1.0, 0.0, 1.0]],
                }],
                deployed_model_id: None,
            })
        }
    }

    struct FailingStore;

    impl ObjectStore for FailingStore {
        fn download(&self, uri: &StorageUri) -> Result<Vec<u8>> {
            Err(DetectError::backend("storage", format!("{uri} returned 404: No such object")))
        }
    }

    fn fakes(fail: bool) -> (FakeStore, FakeClient) {
        (
            FakeStore {
                calls: Cell::new(0),
                bytes: vec![1, 2, 3],
            },
            FakeClient {
                seen: RefCell::new(Vec::new()),
                fail,
            },
        )
    }

    #[test]
    fn sends_single_encoded_instance() {
        let (store, client) = fakes(false);
        let predictor = Predictor::new(&store, &client);
        let prediction = predictor.predict("gs://drawings/a.png").unwrap().unwrap();

        assert_eq!(prediction.image_bytes, vec![1, 2, 3]);
        assert_eq!(prediction.response.predictions.len(), 1);
        assert_eq!(store.calls.get(), 1);
        assert_eq!(*client.seen.borrow(), vec![Instance::from_image_bytes(&[1, 2, 3])]);
    }

    #[test]
    fn malformed_uri_makes_no_calls() {
        let (store, client) = fakes(false);
        let predictor = Predictor::new(&store, &client);
        assert!(predictor.predict("gs://drawings").unwrap().is_none());
        assert_eq!(store.calls.get(), 0);
        assert!(client.seen.borrow().is_empty());
    }

    #[test]
    fn backend_errors_propagate() {
        let (store, client) = fakes(true);
        let predictor = Predictor::new(&store, &client);
        let err = predictor.predict("gs://drawings/a.png").unwrap_err();
        assert!(matches!(err, DetectError::Backend { service: "prediction", .. }));
    }

    #[test]
    fn download_failure_skips_prediction() {
        let (_, client) = fakes(false);
        let predictor = Predictor::new(FailingStore, &client);
        let err = predictor.predict("gs://drawings/missing.png").unwrap_err();
        match err {
            DetectError::Backend { service, message } => {
                assert_eq!(service, "storage");
                assert!(message.contains("gs://drawings/missing.png"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(client.seen.borrow().is_empty());
    }
}
