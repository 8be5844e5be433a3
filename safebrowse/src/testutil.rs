use crate::api::{schema, ApiClient};
use crate::error::Error;
use crate::list::ThreatList;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
struct Inner {
  catalog: RefCell<Vec<ThreatList>>,
  catalog_fetches: RefCell<usize>,
  updates: RefCell<VecDeque<Result<schema::FetchResponse, u16>>>,
  finds: RefCell<VecDeque<Result<schema::FindResponse, u16>>>,
  update_requests: RefCell<Vec<schema::FetchRequest>>,
  find_requests: RefCell<Vec<schema::FindRequest>>,
}

/// Scripted stand-in for the live API: responses are queued up front, every
/// request is recorded for later assertions. An unscripted call fails with a
/// sentinel status so tests notice immediately.
#[derive(Clone, Default)]
pub(crate) struct FakeApi(Rc<Inner>);

impl FakeApi {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn set_catalog(&self, lists: Vec<ThreatList>) {
    *self.0.catalog.borrow_mut() = lists;
  }

  pub(crate) fn push_update(&self, body: serde_json::Value) {
    let response = serde_json::from_value(body).expect("scripted update response must parse");
    self.0.updates.borrow_mut().push_back(Ok(response));
  }

  pub(crate) fn push_update_error(&self, status: u16) {
    self.0.updates.borrow_mut().push_back(Err(status));
  }

  pub(crate) fn push_find(&self, body: serde_json::Value) {
    let response = serde_json::from_value(body).expect("scripted find response must parse");
    self.0.finds.borrow_mut().push_back(Ok(response));
  }

  pub(crate) fn push_find_error(&self, status: u16) {
    self.0.finds.borrow_mut().push_back(Err(status));
  }

  pub(crate) fn update_requests(&self) -> Vec<schema::FetchRequest> {
    self.0.update_requests.borrow().clone()
  }

  pub(crate) fn find_requests(&self) -> Vec<schema::FindRequest> {
    self.0.find_requests.borrow().clone()
  }

  pub(crate) fn catalog_fetches(&self) -> usize {
    *self.0.catalog_fetches.borrow()
  }
}

impl ApiClient for FakeApi {
  fn fetch_threat_lists(&self) -> Result<schema::ThreatListsResponse, Error> {
    *self.0.catalog_fetches.borrow_mut() += 1;
    Ok(schema::ThreatListsResponse {
      threat_lists: self.0.catalog.borrow().clone(),
    })
  }

  fn fetch_updates(&self, request: &schema::FetchRequest) -> Result<schema::FetchResponse, Error> {
    self.0.update_requests.borrow_mut().push(request.clone());
    match self.0.updates.borrow_mut().pop_front() {
      Some(Ok(response)) => Ok(response),
      Some(Err(status)) => Err(Error::HttpStatus {
        endpoint: "threatListUpdates:fetch".to_string(),
        status,
      }),
      None => Err(Error::HttpStatus {
        endpoint: "threatListUpdates:fetch".to_string(),
        status: 599,
      }),
    }
  }

  fn find_full_hashes(&self, request: &schema::FindRequest) -> Result<schema::FindResponse, Error> {
    self.0.find_requests.borrow_mut().push(request.clone());
    match self.0.finds.borrow_mut().pop_front() {
      Some(Ok(response)) => Ok(response),
      Some(Err(status)) => Err(Error::HttpStatus {
        endpoint: "fullHashes:find".to_string(),
        status,
      }),
      None => Err(Error::HttpStatus {
        endpoint: "fullHashes:find".to_string(),
        status: 599,
      }),
    }
  }
}
