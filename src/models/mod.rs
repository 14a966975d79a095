pub mod link;

pub use link::{
    Click, ClickMetadata, ClickWindowCounts, ClickWindows, CountDrift, CreateLinkRequest, Link,
    LinkResponse, NewLink, UpdateLinkRequest, millis_to_datetime,
};
