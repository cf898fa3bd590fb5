mod jobs;
mod migrations;
