//! Integration tests for odsync-graph
//!
//! Uses wiremock to simulate the Microsoft Graph API and verifies
//! end-to-end behavior of the GraphClient and GraphCloudProvider: listings,
//! uploads, downloads, error mapping and token refresh.


mod test_auth_refresh;
mod test_items;
mod test_transfers;
