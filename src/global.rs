/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! An optional process-wide default [`Avc`], for callers that only ever
//! need one instance and would rather not thread a handle through every
//! call site — mirrors the kernel's single `avc_cache`.

use std::any::Any;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::audit::AuditSink;
use crate::avc::Avc;
use crate::policy_engine::PolicyEngine;

static GLOBAL: OnceCell<Arc<dyn Any + Send + Sync>> = OnceCell::new();

/// Installs `avc` as the process-wide default. Fails, returning the value
/// back, if a default has already been installed.
pub fn install<P, A>(avc: Avc<P, A>) -> Result<(), Avc<P, A>>
where
	P: PolicyEngine + 'static,
	A: AuditSink + 'static,
{
	let arc: Arc<Avc<P, A>> = Arc::new(avc);
	let erased: Arc<dyn Any + Send + Sync> = arc.clone();

	match GLOBAL.set(erased) {
		Ok(()) => Ok(()),
		Err(_rejected) => Err(Arc::into_inner(arc).expect("no other reference exists yet")),
	}
}

/// Returns the process-wide default, if one was installed with matching
/// `P`/`A` type parameters.
#[must_use]
pub fn global<P, A>() -> Option<Arc<Avc<P, A>>>
where
	P: PolicyEngine + 'static,
	A: AuditSink + 'static,
{
	GLOBAL.get().and_then(|any| any.clone().downcast::<Avc<P, A>>().ok())
}
