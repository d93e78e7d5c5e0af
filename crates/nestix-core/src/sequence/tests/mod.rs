mod negation;
mod union;
