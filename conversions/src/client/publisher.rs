use crate::prelude::config::REQUEST_TIMEOUT;
use crate::prelude::models::{DispatchOutcome, EventBatch};
use crate::prelude::Error;
use reqwest::{Client, Request};

/// Builds the POST for one batch. Fails with `Error::Unexpected` when the url is malformed.
pub(crate) fn build_request(
    client: &Client,
    url: &str,
    params: &[(&str, &str)],
    batch: &EventBatch<'_>,
) -> Result<Request, Error> {
    client
        .post(url)
        .query(params)
        .json(batch)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(Error::from_request)
}

/// Posts one batch and classifies the response. Exactly one request, no retry.
pub(crate) async fn post_batch(
    client: &Client,
    url: &str,
    params: &[(&str, &str)],
    batch: &EventBatch<'_>,
) -> Result<DispatchOutcome, Error> {
    let request = build_request(client, url, params, batch)?;
    let response = client.execute(request).await.map_err(Error::from_request)?;

    let status = response.status();
    let body = response.text().await;

    if !status.is_success() {
        return Err(Error::Delivery {
            status: Some(status.as_u16()),
            message: body.unwrap_or_default(),
        });
    }

    let body = body.map_err(|e| Error::Unexpected(format!("failed to read response body: {}", e)))?;

    Ok(DispatchOutcome::Delivered {
        status: status.as_u16(),
        body,
    })
}
