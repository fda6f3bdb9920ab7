// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model transformation engine
//!
//! A policy implements [`ModelTransform`]; [`ModelTransformExt::run`] drives it
//! over a source model:
//!
//! 1. a fresh target store is opened in one transaction and receives the
//!    source's factors and (editor-stamped) metadata
//! 2. `do_preprocess_transform` may validate preferences or bail out early
//! 3. every source entity is visited in declaration order and classified by
//!    `pass_instance`; accepted entities are copied structurally, pulling in
//!    whatever they reference through the identity map
//! 4. `do_post_transform` may synthesize entities on the populated target
//! 5. the transaction commits only when all phases succeeded
//!
//! Cancellation is polled between entities and rolls the target back.

use crate::{
    ProgressToken, Result, TransformAction, TransformCode, TransformConfig, TransformError,
    TransformPackage, TransformResult,
};
use ifc_lite_model::{AttributeValue, DecodedEntity, EntityId, IfcModel, PropertyDescriptor};
use ifc_lite_store::{new_handle, ModelHandle, Transaction};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Number of entities walked between two cooperative yields
const YIELD_EVERY: usize = 64;

/// How a source entity is carried into the target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassDecision {
    /// Not carried over; references to it vanish
    Drop,
    /// Structural copy over forward attributes
    Copy,
    /// Structural copy, also pulling in the entities referring to it
    CopyWithInverse,
    /// Copy through [`ModelTransform::delegate_copy`]
    Delegate,
}

/// Result of the preprocessing phase
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhaseOutcome {
    Proceed,
    /// The source cannot be handled by this policy
    NotSupported(String),
}

/// Future of one transformation run
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = TransformResult> + Send + 'a>>;

/// A transformation policy
pub trait ModelTransform: Send + Sync {
    /// Policy-specific run state carried by the package
    type State: Send;

    fn name(&self) -> &str;

    fn config(&self) -> &TransformConfig;

    /// Build the per-run context
    fn create_transform_package(
        &self,
        source: Arc<dyn IfcModel>,
        target: ModelHandle,
        progress: ProgressToken,
    ) -> Result<TransformPackage<Self::State>>;

    /// Classify a source entity
    ///
    /// Evaluated at most once per entity and run; later requests reuse the
    /// first answer.
    fn pass_instance(
        &self,
        entity: &DecodedEntity,
        package: &mut TransformPackage<Self::State>,
    ) -> Result<PassDecision>;

    /// Empty target store sharing the source's schema
    fn create_target(&self, source: &dyn IfcModel) -> ModelHandle {
        new_handle(Arc::clone(source.schema()))
    }

    /// Value of a property of a copy
    ///
    /// Asked for every forward attribute, and for every inverse property when
    /// the entity is copied with its back-references. The returned value is in
    /// source identities; every reference it holds is mapped (and materialized
    /// on demand) by the engine. Returning `Null` for an inverse leaves its
    /// referrers to the walk.
    fn property_transform(
        &self,
        descriptor: &PropertyDescriptor,
        host: &DecodedEntity,
        package: &mut TransformPackage<Self::State>,
    ) -> Result<AttributeValue> {
        Ok(forward_property(descriptor, host, package))
    }

    /// Copy an entity classified as [`PassDecision::Delegate`]
    fn delegate_copy(
        &self,
        entity: &DecodedEntity,
        package: &mut TransformPackage<Self::State>,
    ) -> Result<Option<EntityId>> {
        copy_instance(self, entity.id, true, package)
    }

    fn do_preprocess_transform(
        &self,
        _package: &mut TransformPackage<Self::State>,
    ) -> Result<PhaseOutcome> {
        Ok(PhaseOutcome::Proceed)
    }

    fn do_post_transform(&self, _package: &mut TransformPackage<Self::State>) -> Result<()> {
        Ok(())
    }
}

/// Unchanged source value of a property
///
/// Returns `Null` once cancellation has been requested.
pub fn forward_property<S>(
    descriptor: &PropertyDescriptor,
    host: &DecodedEntity,
    package: &TransformPackage<S>,
) -> AttributeValue {
    if package.progress().is_about_cancelling() {
        return AttributeValue::Null;
    }
    package.navigator().value(host, descriptor)
}

/// Memoized pass decision of a source entity
pub fn pass_decision<T: ModelTransform + ?Sized>(
    policy: &T,
    entity: &DecodedEntity,
    package: &mut TransformPackage<T::State>,
) -> Result<PassDecision> {
    if let Some(decision) = package.decision(entity.id) {
        return Ok(decision);
    }
    let decision = policy.pass_instance(entity, package)?;
    package.remember_decision(entity.id, decision);
    Ok(decision)
}

/// Entity created in the target whose attributes are still to be written
struct Pending {
    source: Arc<DecodedEntity>,
    target: EntityId,
    with_inverse: bool,
}

/// Copy a source entity and everything it drags along
///
/// Returns the existing target if the entity was copied before. The copy is
/// registered before its attributes are resolved, so reference cycles close
/// onto it.
pub fn copy_instance<T: ModelTransform + ?Sized>(
    policy: &T,
    id: EntityId,
    with_inverse: bool,
    package: &mut TransformPackage<T::State>,
) -> Result<Option<EntityId>> {
    if let Some(existing) = package.identity_map().resolve(id) {
        return Ok(Some(existing));
    }
    let entity = package.source_entity(id)?;
    let target = instantiate(package, &entity)?;

    let mut work = vec![Pending {
        source: entity,
        target,
        with_inverse,
    }];
    while let Some(pending) = work.pop() {
        populate(policy, pending, package, &mut work)?;
    }
    Ok(Some(target))
}

fn instantiate<S>(package: &mut TransformPackage<S>, entity: &DecodedEntity) -> Result<EntityId> {
    let target = package.target_mut().create(entity.ifc_type.name())?;
    package.identity_map_mut().register(entity.id, target)?;
    package.log_source(entity.id, TransformAction::Copied);
    log::debug!("copied {} ({}) to {}", entity.id, entity.ifc_type, target);
    Ok(target)
}

/// Target of a referenced source entity, copying it first if its decision asks for it
fn materialize<T: ModelTransform + ?Sized>(
    policy: &T,
    id: EntityId,
    package: &mut TransformPackage<T::State>,
    work: &mut Vec<Pending>,
) -> Result<Option<EntityId>> {
    if let Some(existing) = package.identity_map().resolve(id) {
        return Ok(Some(existing));
    }
    let entity = package.source_entity(id)?;
    let with_inverse = match pass_decision(policy, &entity, package)? {
        PassDecision::Drop => return Ok(None),
        PassDecision::Delegate => return policy.delegate_copy(&entity, package),
        PassDecision::Copy => false,
        PassDecision::CopyWithInverse => true,
    };
    let target = instantiate(package, &entity)?;
    work.push(Pending {
        source: entity,
        target,
        with_inverse,
    });
    Ok(Some(target))
}

fn populate<T: ModelTransform + ?Sized>(
    policy: &T,
    pending: Pending,
    package: &mut TransformPackage<T::State>,
    work: &mut Vec<Pending>,
) -> Result<()> {
    let entity = pending.source;
    let type_name = entity.ifc_type.name();
    let schema = Arc::clone(package.source_model().schema().entity(type_name)?);

    for descriptor in schema.attributes() {
        let value = policy.property_transform(descriptor, &entity, package)?;
        let value = value.try_map_refs(&mut |r| materialize(policy, r, package, work))?;
        package
            .target_mut()
            .set_attribute(pending.target, descriptor.index, value)?;
    }

    // back-references go through the same hook, so a policy can prune them
    if pending.with_inverse {
        for descriptor in schema.inverses() {
            let value = policy.property_transform(descriptor, &entity, package)?;
            for referrer in value.entity_refs() {
                materialize(policy, referrer, package, work)?;
            }
        }
    }
    Ok(())
}

// ============================================================================
// Run orchestration
// ============================================================================

/// Yields once to the executor
#[derive(Default)]
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

enum Outcome {
    Finished,
    Canceled,
    NotSupported(String),
}

/// Running a policy over a source model
pub trait ModelTransformExt: ModelTransform {
    /// Start a run driven by `progress`
    ///
    /// Fails immediately if the token can no longer drive a run.
    fn run(&self, source: Arc<dyn IfcModel>, progress: ProgressToken) -> Result<RunFuture<'_>> {
        if !progress.is_alive() {
            return Err(TransformError::ProgressTerminated(progress.state()));
        }
        Ok(start(self, source, progress))
    }

    /// Create a token and the not yet started run it drives
    fn prepare(&self, source: Arc<dyn IfcModel>) -> (ProgressToken, RunFuture<'_>) {
        let progress = ProgressToken::new();
        let run = start(self, source, progress.clone());
        (progress, run)
    }
}

impl<T: ModelTransform + ?Sized> ModelTransformExt for T {}

fn start<T: ModelTransform + ?Sized>(
    policy: &T,
    source: Arc<dyn IfcModel>,
    progress: ProgressToken,
) -> RunFuture<'_> {
    progress.set_estimate(source.resolver().entity_count() as u64);
    progress.notify("Starting");
    Box::pin(execute(policy, source, progress))
}

async fn execute<T: ModelTransform + ?Sized>(
    policy: &T,
    source: Arc<dyn IfcModel>,
    progress: ProgressToken,
) -> TransformResult {
    let target = policy.create_target(source.as_ref());
    log::debug!(
        "{}: transforming model {}",
        policy.name(),
        source.model_id()
    );

    let transaction = match open_target(policy, source.as_ref(), &target) {
        Ok(transaction) => transaction,
        Err(err) => return failed(policy, target, Vec::new(), err, &progress),
    };
    let mut package =
        match policy.create_transform_package(source, Arc::clone(&target), progress.clone()) {
            Ok(package) => package,
            Err(err) => {
                rollback(policy, transaction);
                return failed(policy, target, Vec::new(), err, &progress);
            }
        };

    let outcome = drive(policy, &mut package).await;
    let log = package.take_log();
    package.dispose();
    drop(package);

    let result = match outcome {
        Ok(Outcome::Finished) => match transaction.commit() {
            Ok(()) => {
                log::debug!("{}: finished with {} log entries", policy.name(), log.len());
                TransformResult::new(TransformCode::Finished, target, log)
            }
            Err(err) => return failed(policy, target, log, err.into(), &progress),
        },
        Ok(Outcome::Canceled) => {
            rollback(policy, transaction);
            progress.mark_canceled();
            log::debug!("{}: canceled", policy.name());
            TransformResult::new(TransformCode::Canceled, target, log)
                .with_message("canceled by request")
        }
        Ok(Outcome::NotSupported(reason)) => {
            rollback(policy, transaction);
            log::debug!("{}: not supported: {}", policy.name(), reason);
            TransformResult::new(TransformCode::NotSupported, target, log).with_message(reason)
        }
        Err(err) => {
            rollback(policy, transaction);
            return failed(policy, target, log, err, &progress);
        }
    };
    progress.finish("finalized");
    result
}

fn open_target<T: ModelTransform + ?Sized>(
    policy: &T,
    source: &dyn IfcModel,
    target: &ModelHandle,
) -> Result<Transaction> {
    let transaction = Transaction::begin(target, policy.name())?;
    let metadata = policy.config().editor.stamp(source.metadata());
    let mut store = target.write();
    store.initialise_factors(source.factors())?;
    store.set_metadata(metadata)?;
    Ok(transaction)
}

fn rollback<T: ModelTransform + ?Sized>(policy: &T, transaction: Transaction) {
    if let Err(err) = transaction.rollback() {
        log::warn!("{}: rollback failed: {}", policy.name(), err);
    }
}

fn failed<T: ModelTransform + ?Sized>(
    policy: &T,
    target: ModelHandle,
    log: Vec<crate::LogEntry>,
    err: TransformError,
    progress: &ProgressToken,
) -> TransformResult {
    log::error!("{}: run failed: {}", policy.name(), err);
    progress.mark_broken();
    progress.finish("finalized");
    TransformResult::new(TransformCode::ExitWithError, target, log).with_cause(err)
}

async fn drive<T: ModelTransform + ?Sized>(
    policy: &T,
    package: &mut TransformPackage<T::State>,
) -> Result<Outcome> {
    package.progress().notify("Preparing");
    if let PhaseOutcome::NotSupported(reason) = policy.do_preprocess_transform(package)? {
        return Ok(Outcome::NotSupported(reason));
    }

    package.progress().notify("Running");
    if !walk(policy, package).await? {
        return Ok(Outcome::Canceled);
    }

    package.progress().notify("Post processing");
    policy.do_post_transform(package)?;
    if package.progress().is_about_cancelling() {
        return Ok(Outcome::Canceled);
    }
    Ok(Outcome::Finished)
}

/// Visit every source entity; `false` if canceled on the way
async fn walk<T: ModelTransform + ?Sized>(
    policy: &T,
    package: &mut TransformPackage<T::State>,
) -> Result<bool> {
    let ids = package.source_model().resolver().all_ids();
    for (n, id) in ids.into_iter().enumerate() {
        if n % YIELD_EVERY == 0 {
            YieldNow::default().await;
        }
        if package.progress().is_about_cancelling() {
            return Ok(false);
        }
        let entity = package.source_entity(id)?;
        if let Err(err) = visit(policy, &entity, package) {
            log::error!(
                "{}: transforming {} ({}) failed: {}",
                policy.name(),
                entity.id,
                entity.ifc_type,
                err
            );
            return Err(err);
        }
        package.progress().report(1, None);
    }
    Ok(true)
}

fn visit<T: ModelTransform + ?Sized>(
    policy: &T,
    entity: &DecodedEntity,
    package: &mut TransformPackage<T::State>,
) -> Result<()> {
    match pass_decision(policy, entity, package)? {
        PassDecision::Drop => {
            package.log_source(entity.id, TransformAction::Skipped);
        }
        PassDecision::Copy => {
            copy_instance(policy, entity.id, false, package)?;
        }
        PassDecision::CopyWithInverse => {
            copy_instance(policy, entity.id, true, package)?;
        }
        PassDecision::Delegate => {
            if !package.identity_map().contains(entity.id) {
                policy.delegate_copy(entity, package)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FnPolicy};
    use crate::{LogFilter, ProgressState};
    use ifc_lite_model::{EntityResolver, EntityResolverExt, IfcType};
    use ifc_lite_store::MemoryModel;

    fn names(model: &MemoryModel, type_name: &str) -> Vec<String> {
        model
            .find_by_type_name(type_name)
            .iter()
            .filter_map(|e| e.get_string(2).map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_copy_everything_is_structurally_equal() {
        let (source, _) = fixtures::building_model();
        let count = source.len();
        let source: Arc<dyn IfcModel> = Arc::new(source);
        let policy = FnPolicy::new(|_, _| Ok(PassDecision::Copy));

        let result = policy

            .run(Arc::clone(&source), ProgressToken::new())

            .unwrap()

            .await;
        assert_eq!(result.code, TransformCode::Finished, "{:?}", result.cause);
        assert_eq!(result.count(TransformAction::Copied), count);

        let target = result.into_model().unwrap();
        assert_eq!(target.len(), count);
        assert!(target.validate().is_ok());
        assert_eq!(target.factors(), source.factors());
        for id in source.resolver().all_ids() {
            let ifc_type = source.resolver().type_of(id).unwrap();
            assert_eq!(
                target.count_by_type(&ifc_type),
                source.resolver().count_by_type(&ifc_type)
            );
        }
    }

    #[tokio::test]
    async fn test_pset_scenario_drops_named_sets() {
        let source: Arc<dyn IfcModel> = Arc::new(fixtures::pset_model());
        let name = source
            .schema()
            .property("IfcPropertySet", "Name")
            .unwrap()
            .index;
        let policy = FnPolicy::new(move |entity, _| {
            Ok(
                if entity.ifc_type == IfcType::IfcPropertySet
                    && entity.get_string(name) == Some("A")
                {
                    PassDecision::Drop
                } else {
                    PassDecision::Copy
                },
            )
        });
        let named = |wanted: &str| -> Vec<EntityId> {
            source
                .resolver()
                .entities_by_type(&IfcType::IfcPropertySet)
                .iter()
                .filter(|pset| pset.get_string(name) == Some(wanted))
                .map(|pset| pset.id)
                .collect()
        };
        let (a_sets, b_sets) = (named("A"), named("B"));
        assert_eq!((a_sets.len(), b_sets.len()), (4, 2));

        let result = policy

            .run(Arc::clone(&source), ProgressToken::new())

            .unwrap()

            .await;
        assert!(result.is_finished());
        assert_eq!(result.count(TransformAction::Skipped), 4);
        // the wall, all six properties and assignments, the two "B" sets
        assert_eq!(result.count(TransformAction::Copied), 15);
        let copied: Vec<EntityId> = result
            .entries(TransformAction::Copied)
            .map(|e| e.label())
            .collect();
        assert!(a_sets.iter().all(|id| !copied.contains(id)));
        assert!(b_sets.iter().all(|id| copied.contains(id)));

        let target = result.into_model().unwrap();
        let psets = names(&target, "IFCPROPERTYSET");
        assert_eq!(psets, vec!["B".to_string(), "B".to_string()]);
        assert!(target.validate().is_ok());
    }

    #[tokio::test]
    async fn test_dropped_entities_leave_no_reference() {
        let (source, ids) = fixtures::building_model();
        let source: Arc<dyn IfcModel> = Arc::new(source);
        let wall = ids.wall_1;
        let policy = FnPolicy::new(move |entity, _| {
            Ok(if entity.id == wall {
                PassDecision::Drop
            } else {
                PassDecision::Copy
            })
        });

        let result = policy

            .run(Arc::clone(&source), ProgressToken::new())

            .unwrap()

            .await;
        assert!(result.is_finished());
        let log = result.log.clone();
        let target = result.into_model().unwrap();
        assert_eq!(target.len(), source.resolver().entity_count() - 1);
        assert!(target.validate().is_ok());

        let skipped: Vec<_> = log
            .iter()
            .filter(|e| e.action == TransformAction::Skipped)
            .map(|e| e.label())
            .collect();
        assert_eq!(skipped, vec![wall]);

        // The containment relationship survives without the wall
        assert!(!names(&target, "IFCWALL").contains(&"Wall 1".to_string()));
        for rel in target.find_by_type_name("IFCRELCONTAINEDINSPATIALSTRUCTURE") {
            let members = rel.get_refs(4).unwrap_or_default();
            assert!(!members.is_empty());
            assert!(members.iter().all(|m| target.exists(*m)));
        }
    }

    #[tokio::test]
    async fn test_reference_cycle_terminates() {
        let source = fixtures::placement_cycle_model(5);
        let count = source.len();
        let source: Arc<dyn IfcModel> = Arc::new(source);
        let policy = FnPolicy::new(|_, _| Ok(PassDecision::Copy));

        let result = policy.run(source, ProgressToken::new()).unwrap().await;
        assert!(result.is_finished());
        let target = result.into_model().unwrap();
        assert_eq!(target.len(), count);

        // every placement still points at another placement
        for placement in target.find_by_type_name("IFCLOCALPLACEMENT") {
            let relative = placement.get_ref(0).unwrap();
            assert_eq!(target.type_of(relative), Some(IfcType::IfcLocalPlacement));
        }
    }

    #[tokio::test]
    async fn test_pass_decision_is_asked_once() {
        let (source, _) = fixtures::building_model();
        let count = source.len();
        let source: Arc<dyn IfcModel> = Arc::new(source);
        let asked = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&asked);
        let policy = FnPolicy::new(move |_, _| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(PassDecision::Copy)
        });

        let result = policy.run(source, ProgressToken::new()).unwrap().await;
        assert!(result.is_finished());
        assert_eq!(asked.load(std::sync::atomic::Ordering::SeqCst), count);
    }

    #[tokio::test]
    async fn test_copy_without_inverse_leaves_referrers_behind() {
        let (source, ids) = fixtures::building_model();
        let source: Arc<dyn IfcModel> = Arc::new(source);
        let storey = ids.storey_1;
        let policy = FnPolicy::new(move |entity, _| {
            Ok(if entity.id == storey {
                PassDecision::Copy
            } else {
                PassDecision::Drop
            })
        });
        let result = policy
            .run(Arc::clone(&source), ProgressToken::new())
            .unwrap()
            .await;
        assert!(result.is_finished());
        let target = result.into_model().unwrap();
        assert_eq!(target.count_by_type(&IfcType::IfcBuildingStorey), 1);
        assert_eq!(
            target.count_by_type(&IfcType::IfcRelContainedInSpatialStructure),
            0
        );
        assert_eq!(target.count_by_type(&IfcType::IfcRelAggregates), 0);
    }

    #[tokio::test]
    async fn test_copy_with_inverse_pulls_referrers() {
        let (source, ids) = fixtures::building_model();
        let source: Arc<dyn IfcModel> = Arc::new(source);
        let storey = ids.storey_1;
        let policy = FnPolicy::new(move |entity, _| {
            Ok(if entity.id == storey {
                PassDecision::CopyWithInverse
            } else if entity.ifc_type == IfcType::IfcRelContainedInSpatialStructure
                && entity.get_ref(5) == Some(storey)
            {
                PassDecision::Copy
            } else {
                PassDecision::Drop
            })
        });
        let result = policy
            .run(Arc::clone(&source), ProgressToken::new())
            .unwrap()
            .await;
        assert!(result.is_finished());
        let target = result.into_model().unwrap();
        assert_eq!(target.count_by_type(&IfcType::IfcBuildingStorey), 1);
        let rels = target.find_by_type_name("IFCRELCONTAINEDINSPATIALSTRUCTURE");
        assert_eq!(rels.len(), 1);
        // walls were dropped, so the relationship lost its members
        assert!(rels[0].get(4).map(|v| v.is_null()).unwrap_or(false));
    }

    /// Copies storey 1 with its back-references and stops once a wall is
    /// reached; returns the copied source labels and the inverse hook calls
    async fn copy_storey_until_walls(prune_contents: bool) -> (Vec<EntityId>, EntityId, usize) {
        let (source, ids) = fixtures::building_model();
        let storey = ids.storey_1;
        let containment = source
            .find_by_type_name("IFCRELCONTAINEDINSPATIALSTRUCTURE")
            .iter()
            .find(|rel| rel.get_ref(5) == Some(storey))
            .map(|rel| rel.id)
            .unwrap();
        let source: Arc<dyn IfcModel> = Arc::new(source);

        let inverse_calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&inverse_calls);
        let policy = FnPolicy::new(move |entity, package| {
            Ok(if entity.id == storey {
                PassDecision::CopyWithInverse
            } else if entity.id == containment {
                PassDecision::Copy
            } else {
                if entity.ifc_type == IfcType::IfcWall {
                    package.progress().cancel();
                }
                PassDecision::Drop
            })
        })
        .with_property(move |descriptor, host, package| {
            if descriptor.is_inverse() {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if prune_contents && descriptor.name == "ContainsElements" {
                    return Ok(AttributeValue::Null);
                }
            }
            Ok(forward_property(descriptor, host, package))
        });

        let result = policy.run(source, ProgressToken::new()).unwrap().await;
        assert_eq!(result.code, TransformCode::Canceled);
        let copied = result
            .entries(TransformAction::Copied)
            .map(|e| e.label())
            .collect();
        let calls = inverse_calls.load(std::sync::atomic::Ordering::SeqCst);
        (copied, containment, calls)
    }

    #[tokio::test]
    async fn test_inverse_properties_go_through_property_hook() {
        // the containment is pulled in with the storey, before any wall is visited
        let (copied, containment, calls) = copy_storey_until_walls(false).await;
        assert!(calls > 0);
        assert!(copied.contains(&containment));

        // nulling the inverse keeps it out
        let (copied, containment, calls) = copy_storey_until_walls(true).await;
        assert!(calls > 0);
        assert!(!copied.contains(&containment));
    }

    #[tokio::test]
    async fn test_delegate_defaults_to_copy_with_inverse() {
        let (source, ids) = fixtures::building_model();
        let source: Arc<dyn IfcModel> = Arc::new(source);
        let storey = ids.storey_1;
        let policy = FnPolicy::new(move |entity, _| {
            Ok(if entity.id == storey {
                PassDecision::Delegate
            } else if entity.ifc_type == IfcType::IfcRelContainedInSpatialStructure
                && entity.get_ref(5) == Some(storey)
            {
                PassDecision::Copy
            } else {
                PassDecision::Drop
            })
        });
        let result = policy.run(source, ProgressToken::new()).unwrap().await;
        let target = result.into_model().unwrap();
        assert_eq!(
            target.count_by_type(&IfcType::IfcRelContainedInSpatialStructure),
            1
        );
    }

    #[tokio::test]
    async fn test_deterministic_logs() {
        let source: Arc<dyn IfcModel> = Arc::new(fixtures::building_model().0);
        let policy = FnPolicy::new(|entity, _| {
            Ok(if entity.ifc_type == IfcType::IfcWall {
                PassDecision::Drop
            } else {
                PassDecision::Copy
            })
        });
        let first = policy
            .run(Arc::clone(&source), ProgressToken::new())
            .unwrap()
            .await;
        let second = policy
            .run(Arc::clone(&source), ProgressToken::new())
            .unwrap()
            .await;
        let labels = |r: &TransformResult| {
            r.log
                .iter()
                .map(|e| (e.label(), e.action))
                .collect::<Vec<_>>()
        };
        assert_eq!(labels(&first), labels(&second));
        assert_eq!(first.target.read().len(), second.target.read().len());
    }

    #[tokio::test]
    async fn test_cancel_mid_run_rolls_back() {
        let (source, _) = fixtures::building_model();
        let source: Arc<dyn IfcModel> = Arc::new(source);
        let policy = FnPolicy::new(|entity, package| {
            if entity.ifc_type == IfcType::IfcBuildingStorey {
                package.progress().cancel();
            }
            Ok(PassDecision::Copy)
        });

        let (progress, run) = policy.prepare(source);
        let result = run.await;
        assert_eq!(result.code, TransformCode::Canceled);
        assert!(result.cause.is_none());
        assert!(result.target.read().is_empty());
        assert!(!result.target.read().in_transaction());
        assert!(!result.log.is_empty());
        assert_eq!(progress.state(), ProgressState::Canceled);
        assert!(result.into_model().is_err());
    }

    #[tokio::test]
    async fn test_schema_mismatch_exits_with_error() {
        let source: Arc<dyn IfcModel> = Arc::new(fixtures::pset_model());
        let policy = FnPolicy::new(|_, _| Ok(PassDecision::Copy)).with_property(
            |descriptor, host, package| {
                if descriptor.is_reference() {
                    return Ok(AttributeValue::from("not a reference"));
                }
                Ok(forward_property(descriptor, host, package))
            },
        );

        let progress = ProgressToken::new();
        let result = policy.run(source, progress.clone()).unwrap().await;
        assert_eq!(result.code, TransformCode::ExitWithError);
        assert!(matches!(
            result.cause,
            Some(TransformError::Model(ifc_lite_model::ModelError::SchemaMismatch { .. }))
        ));
        assert!(result.target.read().is_empty());
        assert_eq!(progress.state(), ProgressState::Broken);
    }

    #[tokio::test]
    async fn test_not_supported_ends_early() {
        let source: Arc<dyn IfcModel> = Arc::new(fixtures::pset_model());
        let policy = FnPolicy::new(|_, _| Ok(PassDecision::Copy))
            .with_preprocess(|_| Ok(PhaseOutcome::NotSupported("no storeys".into())));
        let result = policy.run(source, ProgressToken::new()).unwrap().await;
        assert_eq!(result.code, TransformCode::NotSupported);
        assert_eq!(result.message.as_deref(), Some("no storeys"));
        assert!(result.log.is_empty());
        assert!(result.target.read().is_empty());
    }

    #[test]
    fn test_terminated_token_is_rejected() {
        let source: Arc<dyn IfcModel> = Arc::new(fixtures::pset_model());
        let policy = FnPolicy::new(|_, _| Ok(PassDecision::Copy));
        let progress = ProgressToken::new();
        progress.finish("done");
        assert!(matches!(
            policy.run(source, progress),
            Err(TransformError::ProgressTerminated(ProgressState::Terminated))
        ));
    }

    #[tokio::test]
    async fn test_log_filter_and_editor_are_applied() {
        let source: Arc<dyn IfcModel> = Arc::new(fixtures::pset_model());
        let config = TransformConfig::new()
            .with_log_filter(LogFilter::only([TransformAction::Skipped]))
            .with_editor(crate::EditorCredentials::default().with_organization("ACME"));
        let policy = FnPolicy::new(|_, _| Ok(PassDecision::Copy)).with_config(config);
        let progress = ProgressToken::new();
        let result = policy.run(source, progress.clone()).unwrap().await;
        assert!(result.is_finished());
        assert!(result.log.is_empty());
        assert_eq!(
            result.target.read().metadata().organization.as_deref(),
            Some("ACME")
        );
        assert_eq!(progress.state(), ProgressState::Terminated);
        assert_eq!(progress.message(), "finalized");
    }
}
