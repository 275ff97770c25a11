use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::ServiceCore;
use crate::dto::{OpportunityInput, StageChange};
use crate::error::{AppError, AppResult};
use crate::pipeline::{group_pipeline, next_stage, PipelineResult, SalesStage};
use crate::storage::{Opportunity, Storage};

/// Opportunity records and the sales pipeline.
#[derive(Clone)]
pub struct OpportunityService {
    core: ServiceCore,
}

impl OpportunityService {
    /// Create an opportunity service.
    pub fn new(core: ServiceCore) -> Self {
        Self { core }
    }

    /// Validate and store a new opportunity.
    pub async fn create(
        &self,
        input: OpportunityInput,
        now: DateTime<Utc>,
    ) -> AppResult<Opportunity> {
        let mut opp = input.validate()?.into_record(now);
        self.core
            .check_refs(opp.account_id.as_ref(), opp.contact_id.as_ref())
            .await?;
        stamp_close(&mut opp, now);
        self.core.storage().create_opportunity(&opp).await?;

        info!(
            opportunity_id = %opp.id,
            stage = %opp.sales_stage,
            probability = opp.probability,
            "Opportunity created"
        );
        Ok(opp)
    }

    /// Fetch an opportunity by id.
    pub async fn get(&self, id: &str) -> AppResult<Opportunity> {
        self.core
            .storage()
            .get_opportunity(id)
            .await?
            .ok_or_else(|| AppError::not_found("Opportunity", id))
    }

    /// Move to the requested stage.
    pub async fn set_stage(
        &self,
        id: &str,
        change: StageChange,
        now: DateTime<Utc>,
    ) -> AppResult<Opportunity> {
        let change = change.validate()?;
        let mut opp = self.get(id).await?;
        self.move_to(&mut opp, change.stage, change.probability, now)
            .await?;
        Ok(opp)
    }

    /// Move to the next stage in the table. Closed deals stay where they are.
    pub async fn advance(&self, id: &str, now: DateTime<Utc>) -> AppResult<Opportunity> {
        let mut opp = self.get(id).await?;
        let next = next_stage(opp.sales_stage);
        if next == opp.sales_stage {
            debug!(opportunity_id = %opp.id, stage = %next, "No stage to advance to");
            return Ok(opp);
        }
        self.move_to(&mut opp, next, None, now).await?;
        Ok(opp)
    }

    async fn move_to(
        &self,
        opp: &mut Opportunity,
        stage: SalesStage,
        probability: Option<u8>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let from = opp.sales_stage;
        opp.set_stage(stage, probability, now);
        stamp_close(opp, now);
        self.core.storage().update_opportunity(opp).await?;

        info!(
            opportunity_id = %opp.id,
            from = %from,
            to = %opp.sales_stage,
            probability = opp.probability,
            "Opportunity stage changed"
        );
        Ok(())
    }

    /// Open opportunities grouped by stage.
    pub async fn pipeline(&self) -> AppResult<PipelineResult> {
        let open = self.core.storage().list_open_opportunities().await?;
        Ok(group_pipeline(&open))
    }
}

/// Closed deals without a close date are closed as of `now`.
fn stamp_close(opp: &mut Opportunity, now: DateTime<Utc>) {
    if opp.sales_stage.is_closed() && opp.date_closed.is_none() {
        opp.date_closed = Some(now);
    }
}
