/*!
# Chore Tracker

A single-page tool for logging chores and charting how long they take.

## Overview

Rows of (date, task, duration) are kept in a flat CSV file. Through a web form
the user appends one entry at a time or uploads a whole CSV file, and the page
shows every row as a table next to a line chart of duration over time, one
line per task.

## Architecture

### Record Store
- Owns the backing CSV file (header `Date,Task,Duration`)
- Reads the whole file on every operation, rewrites it on every change
- A missing file is an empty record set, not an error

### Chart Renderer
- Coerces dates and durations; unreadable values become `None`
- Groups rows by task, sorts each group by date
- Draws one marked line per task with plotters and encodes it as PNG

### Web Layer
- **Technologies**: axum, handlebars
- Serves the page, the entry and upload forms, and JSON/PNG/CSV endpoints
- Holds the single store handle behind a mutex

## Modules

- **record**: Record and RecordSet types, date and duration coercion
- **store**: CSV-backed record store
- **chart**: Chart generation from records
- **error**: Error type shared by all modules
- **config**: Command-line and environment configuration
- **app**: Routing and request handlers

## REST API Endpoints

- `/` - Page with forms, table and chart
- `/add` - Appends one entry from the entry form
- `/upload` - Replaces the records with an uploaded CSV file
- `/api/records` - Records as JSON
- `/chart.png` - Rendered chart
- `/download` - Records as CSV
*/

pub mod chart;
pub mod error;
pub mod record;
pub mod store;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;

pub use chart::*;
pub use error::*;
pub use record::*;
pub use store::*;
