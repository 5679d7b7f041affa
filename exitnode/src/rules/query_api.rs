use shared::models::query::{Query, QueryDestination};
use shared::utilities::errors::AppError;

use crate::neonapi::{NeonClient, PreparedRequest};
use crate::repos::QuerySaver;

/// Two-phase pattern for any provider API call: persist a pending row,
/// invoke the remote call, then update the row with the outcome. A failure
/// updating the row is combined with a remote failure rather than masking
/// either.
pub async fn call(client: &NeonClient, saver: &QuerySaver, req: PreparedRequest) -> Result<String, AppError> {
    let mut query = Query::pending(
        QueryDestination::Api,
        req.url.clone(),
        req.label.to_string(),
        req.method.to_string(),
        req.body.clone(),
    );

    saver.save(&mut query).await?;

    let send_result = client.send(&req).await;
    let (response_body, remote_err) = match send_result {
        Ok(resp) if resp.is_success() => {
            query.finish(Some(resp.body.clone()), None);
            (Some(resp.body), None)
        }
        Ok(resp) => {
            let err = AppError::ProviderStatus {
                status: resp.status,
                body: resp.body.clone(),
            };
            query.finish(Some(resp.body), Some(&err.to_string()));
            (None, Some(err))
        }
        Err(err) => {
            query.finish(None, Some(&err.to_string()));
            (None, Some(err))
        }
    };

    let update_err = saver.finish_save_result(query.id, &query.result).await.err();

    if let Some(err) = AppError::combine(remote_err, update_err) {
        return Err(err);
    }

    response_body.ok_or_else(|| AppError::Other("provider call succeeded with an empty response".to_string()))
}
