mod collection;
mod participants;
mod scenarios;
