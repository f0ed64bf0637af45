// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Client-side copy of the configured domains
//!
//! The backend owns domain records; this list mirrors the last set the UI
//! loaded plus the updates returned by toggles and preference saves.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use localdomain_common::Domain;

#[derive(Debug, Clone, Default)]
pub struct DomainList {
    inner: Arc<RwLock<Vec<Domain>>>,
}

impl DomainList {
    pub fn new(domains: Vec<Domain>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(domains)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Domain>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Domain>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole list with a freshly loaded one
    pub fn replace(&self, domains: Vec<Domain>) {
        *self.write() = domains;
    }

    pub fn snapshot(&self) -> Vec<Domain> {
        self.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Domain> {
        self.read().iter().find(|d| d.id == id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Domain> {
        self.read().iter().find(|d| d.name == name).cloned()
    }

    /// Insert or replace a record by id
    pub fn upsert(&self, domain: Domain) {
        let mut domains = self.write();
        match domains.iter_mut().find(|d| d.id == domain.id) {
            Some(existing) => *existing = domain,
            None => domains.push(domain),
        }
    }

    /// Remember the subdomain/zone used for a domain's last automatic setup.
    ///
    /// Returns false if the domain is not in the list.
    pub fn record_tunnel_preference(&self, id: &str, subdomain: &str, zone: &str) -> bool {
        let mut domains = self.write();
        match domains.iter_mut().find(|d| d.id == id) {
            Some(domain) => {
                domain.tunnel_subdomain = subdomain.to_string();
                domain.tunnel_domain = zone.to_string();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
