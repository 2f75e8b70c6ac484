//! Two-phase ownership
//!
//! A transfer only nominates the new owner; it takes effect once the nominee
//! calls [`Ownable::accept_ownership`].

use serde::{Deserialize, Serialize};

use crate::{Address, Error, Result, Updated};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownable {
    owner: Address,
    pending_owner: Option<Address>,
}

impl Ownable {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            pending_owner: None,
        }
    }

    /// Created on behalf of `owner`, who still has to accept
    pub fn pending(creator: Address, owner: Address) -> Self {
        Self {
            owner: creator,
            pending_owner: Some(owner),
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn pending_owner(&self) -> Option<&Address> {
        self.pending_owner.as_ref()
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        &self.owner == caller
    }

    pub fn ensure_owner(&self, caller: &Address) -> Result<()> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(Error::AccessDenied)
        }
    }

    /// Nominate a new owner
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<()> {
        self.ensure_owner(caller)?;
        if new_owner == self.owner {
            return Err(Error::InvalidAddress { address: new_owner });
        }
        self.pending_owner = Some(new_owner);
        Ok(())
    }

    /// Complete a pending transfer; only the nominee may call this
    pub fn accept_ownership(&mut self, caller: &Address) -> Result<Updated<Address>> {
        match &self.pending_owner {
            Some(pending) if pending == caller => {
                let previous = std::mem::replace(&mut self.owner, caller.clone());
                self.pending_owner = None;
                tracing::debug!(previous = %previous, current = %caller, "Ownership accepted");
                Ok(Updated::new(previous, caller.clone()))
            }
            _ => Err(Error::AccessDenied),
        }
    }
}
