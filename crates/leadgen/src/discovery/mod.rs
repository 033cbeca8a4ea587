//! Business discovery through a places directory.

pub mod places;

pub use places::{parse_places, GooglePlacesClient, Place, PlaceSearch, PlacesError, UnconfiguredPlaces};
