//! Defect intake: validation, repeat detection, serial resolution, SLA.

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use tracing::{debug, warn};

use super::{DefectLifecycleService, defect_entry};
use crate::domain::defects::{
    DefectPriority, DefectRecord, DefectRecordDraft, DefectStatus, DefectivePart, PartCategory,
    PartSerials, RepeatDefectLink,
};
use crate::domain::history::HistoryAction;
use crate::domain::inventory::InventoryStatus;
use crate::domain::inventory_ledger;
use crate::domain::ports::CreateDefectRequest;
use crate::domain::servers::ServerStatus;
use crate::domain::store_errors::map_store_error;
use crate::domain::unit_of_work::EntityWrite;
use crate::domain::{DefectId, Error, ServerId, UnitOfWork, UserId};

impl DefectLifecycleService {
    pub(super) async fn open_defect(
        &self,
        request: CreateDefectRequest,
    ) -> Result<DefectRecord, Error> {
        let description = request.description.trim().to_owned();
        if description.is_empty() {
            return Err(Error::invalid_request("description must not be blank"));
        }
        let server = self
            .ports
            .servers
            .find_server(request.server_id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| {
                Error::not_found(format!("server {} not found", request.server_id)).with_details(
                    json!({
                        "serverId": request.server_id.to_string(),
                        "code": "server_not_found",
                    }),
                )
            })?;
        self.ensure_user(request.detected_by).await?;

        let at = self.now();
        let priority = request.priority.unwrap_or_default();
        let repeat_of = self.repeat_link(server.id, request.category, at).await?;
        let defective_part = self
            .resolve_defective_part(server.id, request.category, request.serials)
            .await?;
        let sla_deadline = self.sla_deadline(request.category, priority, at).await;

        let record = DefectRecord::new(DefectRecordDraft {
            id: DefectId::random(),
            server_id: server.id,
            detected_by: request.detected_by,
            detected_at: at,
            category: request.category,
            priority,
            description,
            cluster_code: request.cluster_code,
            notes: request.notes,
            vendor_ticket_number: request.vendor_ticket_number,
            defective_part,
            repeat_of,
            sla_deadline,
            extras: request.extras,
        });

        let mut unit = UnitOfWork::new();
        unit.push(EntityWrite::InsertDefect(record.clone()));
        if let Some(marked) = self
            .plan_mark_defective(&record, request.detected_by, at)
            .await?
        {
            unit.absorb(marked);
        }
        unit.push(EntityWrite::SetServerStatus {
            server_id: server.id,
            status: ServerStatus::Defect,
        });
        let mut created = defect_entry(
            &record,
            HistoryAction::Created,
            request.detected_by,
            DefectStatus::New,
            at,
        )
        .with_meta("category", record.category.as_str())
        .with_meta("priority", record.priority.as_str());
        if let Some(link) = &record.repeat_of {
            created = created.with_meta("repeatOf", link.previous_defect_id.to_string());
        }
        unit.record(created);

        self.commit(unit, &record, "defect created").await?;
        Ok(record)
    }

    async fn repeat_link(
        &self,
        server_id: ServerId,
        category: PartCategory,
        at: DateTime<Utc>,
    ) -> Result<Option<RepeatDefectLink>, Error> {
        let days = self.config.repeat_lookback_days;
        let since = TimeDelta::try_days(i64::from(days))
            .and_then(|window| at.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let previous = self
            .ports
            .defects
            .find_latest_finished(server_id, category, since)
            .await
            .map_err(map_store_error)?;
        Ok(previous.map(|previous| RepeatDefectLink {
            previous_defect_id: previous.id,
            reason: format!(
                "{} failed again within {days} days of defect {}",
                category.label(),
                previous.id
            ),
            flagged_at: at,
        }))
    }

    /// Link the stated serials to an installed part, then to the ledger.
    ///
    /// Unknown serials are kept on the record without links.
    pub(super) async fn resolve_defective_part(
        &self,
        server_id: ServerId,
        category: PartCategory,
        serials: PartSerials,
    ) -> Result<DefectivePart, Error> {
        let serials = PartSerials::new(serials.vendor, serials.manufacturer);
        if serials.is_empty() {
            return Ok(DefectivePart::default());
        }
        if let Some(installed) = self
            .ledger
            .find_server_component(server_id, category, &serials)
            .await?
        {
            return Ok(DefectivePart {
                serials,
                server_component_id: Some(installed.id),
                inventory_id: installed.inventory_id,
            });
        }
        let mut inventory_id = None;
        for serial in serials.iter() {
            if let Some(component) = self.ledger.find_by_serial(serial).await? {
                inventory_id = Some(component.id);
                break;
            }
        }
        if inventory_id.is_none() {
            debug!(%server_id, "defective part serials not found in inventory");
        }
        Ok(DefectivePart {
            serials,
            server_component_id: None,
            inventory_id,
        })
    }

    /// Plan marking the tracked component defective when it is still live.
    pub(super) async fn plan_mark_defective(
        &self,
        record: &DefectRecord,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<UnitOfWork>, Error> {
        let Some(component) = self.tracked_component(record).await? else {
            return Ok(None);
        };
        if !matches!(
            component.status(),
            InventoryStatus::Available | InventoryStatus::InUse
        ) {
            debug!(
                component_id = %component.id,
                status = %component.status(),
                "tracked component left as is"
            );
            return Ok(None);
        }
        let note = format!("reported faulty by defect {}", record.id);
        let change = inventory_ledger::mark_defective(component, actor, record.id, &note, at)?;
        Ok(Some(change.unit))
    }

    async fn sla_deadline(
        &self,
        category: PartCategory,
        priority: DefectPriority,
        at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self.ports.sla.deadline(category, priority, at).await {
            Ok(deadline) => deadline,
            Err(error) => {
                warn!(
                    %error,
                    category = %category,
                    priority = %priority,
                    "ExternalDependencyDegraded: SLA deadline not computed"
                );
                None
            }
        }
    }
}
